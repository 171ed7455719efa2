//! Persistent device identifier.
//!
//! The identifier is a random UUIDv4 generated the first time it is needed
//! and stored under [`CredentialKey::DeviceId`]. Generation is single-flight:
//! the first caller reads or creates the value, and every concurrent or later
//! caller in this process waits on and shares that result.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::credentials::{CredentialKey, CredentialStore};

/// Lazily resolved, memoized device identifier.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    store: CredentialStore,
    cell: Arc<OnceCell<String>>,
}

impl DeviceIdentity {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Return the device id, generating and persisting it on first use.
    ///
    /// If the store cannot persist the new value it is still served for the
    /// rest of the process; the next run generates a fresh one.
    pub async fn get_or_create(&self) -> &str {
        self.cell
            .get_or_init(|| async {
                if let Some(existing) = self.store.get(CredentialKey::DeviceId).await {
                    return existing.into_inner();
                }

                let id = generate_device_id();
                self.store.set(CredentialKey::DeviceId, id.clone()).await;
                info!(device_id = %id, "Generated new device identifier");
                id
            })
            .await
    }

    /// The id if it has already been resolved in this process.
    pub fn cached(&self) -> Option<&str> {
        self.cell.get().map(String::as_str)
    }
}

/// Generate a new identifier: lowercase hyphenated UUIDv4.
pub fn generate_device_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
