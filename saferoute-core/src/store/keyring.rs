//! Credentials in the OS keyring.
//!
//! Each credential key gets its own entry: service `saferoute/<key>`, user
//! `saferoute`. Keychain on Apple targets, Credential Manager on Windows and
//! the kernel keyring on Linux.

use async_trait::async_trait;
use keyring::Entry;

use super::{Secret, SecretStore, StoreError};

pub struct KeyringStore {
    service_name: String,
}

impl KeyringStore {
    /// Build a store for `service_name`.
    ///
    /// Only validates that entries can be addressed. Whether the platform
    /// actually keeps what is written is checked by
    /// [`verify_round_trip`](super::verify_round_trip).
    pub fn try_new(service_name: &str) -> Result<Self, StoreError> {
        let store = Self {
            service_name: service_name.to_string(),
        };
        store
            .entry(super::CHECK_KEY)
            .map_err(|e| StoreError::KeyringUnavailable {
                message: e.to_string(),
            })?;
        Ok(store)
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&format!("{}/{}", self.service_name, key), &self.service_name)
            .map_err(|e| keyring_error("open entry", e))
    }
}

fn keyring_error(action: &str, e: keyring::Error) -> StoreError {
    StoreError::BackendError {
        message: format!("keyring {} failed: {}", action, e),
    }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(Secret::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error("read", e)),
        }
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(secret.expose())
            .map_err(|e| keyring_error("write", e))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error("delete", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::verify_round_trip;

    // A headless container may have no usable keyring; these tests only
    // assert what holds either way.

    #[test]
    fn test_try_new_keeps_service_name() {
        match KeyringStore::try_new("saferoute-test") {
            Ok(store) => assert_eq!(store.service_name, "saferoute-test"),
            Err(StoreError::KeyringUnavailable { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[tokio::test]
    async fn test_verified_keyring_round_trips_credentials() {
        let store = match KeyringStore::try_new("saferoute-test-ops") {
            Ok(store) => store,
            Err(_) => return,
        };
        if verify_round_trip(&store).await.is_err() {
            return;
        }

        let key = format!("auth0_access_token-{}", uuid::Uuid::new_v4());
        store.set(&key, &Secret::new("abc123")).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().unwrap().expose(), "abc123");

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        store.delete(&key).await.unwrap();
    }
}
