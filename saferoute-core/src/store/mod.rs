//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for secret storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`FileStore`] - JSON key-value file for targets without a keyring
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Selects a backend once at startup
//!
//! Backends surface their failures as [`StoreError`]. The
//! [`CredentialStore`](crate::credentials::CredentialStore) wrapper is what the
//! rest of the crate talks to, and it downgrades those failures to "absent".
//!
//! # Example
//!
//! ```rust,ignore
//! use saferoute_core::store::{create_store, Secret, StoreBackend};
//!
//! let store = create_store(StoreBackend::Keyring, &data_dir).await;
//! store.set("auth0_access_token", &Secret::new("abc123")).await?;
//! ```

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// Service name used for keyring entries.
pub const KEYRING_SERVICE: &str = "saferoute";

/// File name of the JSON store inside the data directory.
pub const FILE_STORE_NAME: &str = "credentials.json";

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is wiped when the secret is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over secret storage backends.
///
/// There is deliberately no operation to enumerate keys.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Which storage backend to use for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, nothing persists.
    Memory,
    /// Plain JSON file in the data directory.
    File,
    /// OS keyring, falling back to [`StoreBackend::File`] when unavailable.
    #[default]
    Keyring,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::File => "file",
            StoreBackend::Keyring => "keyring",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            "keyring" => Ok(StoreBackend::Keyring),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Key written and removed again by [`verify_round_trip`].
pub(crate) const CHECK_KEY: &str = "saferoute_store_check";

/// Write a throwaway value, read it back and delete it.
///
/// Some keyrings accept writes they never keep, so a handle that opens is not
/// proof the backend works. Any failure is reported as
/// [`StoreError::KeyringUnavailable`].
pub async fn verify_round_trip(store: &dyn SecretStore) -> Result<(), StoreError> {
    let unavailable = |message: String| StoreError::KeyringUnavailable { message };
    let expected = Secret::new(uuid::Uuid::new_v4().to_string());

    store
        .set(CHECK_KEY, &expected)
        .await
        .map_err(|e| unavailable(format!("check write failed: {}", e)))?;
    let read = store.get(CHECK_KEY).await;
    let deleted = store.delete(CHECK_KEY).await;

    match read {
        Ok(Some(value)) if value == expected => {}
        Ok(_) => return Err(unavailable("check value did not read back".to_string())),
        Err(e) => return Err(unavailable(format!("check read failed: {}", e))),
    }
    deleted.map_err(|e| unavailable(format!("check delete failed: {}", e)))
}

/// Create a secret store for the requested backend.
///
/// The capability check happens here, once. Callers get a store that works
/// on this target and never branch on platform again:
///
/// - [`StoreBackend::Keyring`] opens the OS keyring and verifies it with a
///   round trip, falling back to a [`FileStore`] in `data_dir` if that fails
///   or the `keyring-store` feature is disabled.
/// - [`StoreBackend::File`] opens `data_dir/credentials.json`, falling back
///   to a [`MemoryStore`] if the file cannot be read.
/// - [`StoreBackend::Memory`] always succeeds.
pub async fn create_store(backend: StoreBackend, data_dir: &Path) -> Arc<dyn SecretStore> {
    select_store(backend, data_dir, open_keyring()).await
}

#[cfg(feature = "keyring-store")]
async fn open_keyring() -> Result<Arc<dyn SecretStore>, StoreError> {
    let store = KeyringStore::try_new(KEYRING_SERVICE)?;
    verify_round_trip(&store).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "keyring-store"))]
async fn open_keyring() -> Result<Arc<dyn SecretStore>, StoreError> {
    Err(StoreError::KeyringUnavailable {
        message: "keyring-store feature not enabled".to_string(),
    })
}

async fn select_store<F>(
    backend: StoreBackend,
    data_dir: &Path,
    keyring: F,
) -> Arc<dyn SecretStore>
where
    F: Future<Output = Result<Arc<dyn SecretStore>, StoreError>>,
{
    if backend == StoreBackend::Keyring {
        match keyring.await {
            Ok(store) => {
                tracing::info!("Using OS keyring for credential storage");
                return store;
            }
            Err(e) => {
                tracing::warn!("Keyring unavailable ({}), falling back to file storage", e);
            }
        }
    }

    if backend != StoreBackend::Memory {
        let path = data_dir.join(FILE_STORE_NAME);
        match FileStore::open(&path) {
            Ok(store) => {
                tracing::info!("Using file storage at {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "File storage unavailable ({}), falling back to memory store. \
                     Credentials will not persist across restarts.",
                    e
                );
            }
        }
    }

    tracing::debug!("Using in-memory credential storage");
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_into_inner() {
        let secret = Secret::new("value");
        assert_eq!(secret.into_inner(), "value");
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" File ".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert_eq!("KEYRING".parse::<StoreBackend>().unwrap(), StoreBackend::Keyring);
        assert!("vault".parse::<StoreBackend>().is_err());
    }

    /// Accepts writes but never keeps them.
    struct ForgetfulStore;

    #[async_trait]
    impl SecretStore for ForgetfulStore {
        async fn get(&self, _key: &str) -> Result<Option<Secret>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _secret: &Secret) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Fails every write.
    struct ReadOnlyStore;

    #[async_trait]
    impl SecretStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<Secret>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _secret: &Secret) -> Result<(), StoreError> {
            Err(StoreError::BackendError {
                message: "access denied".to_string(),
            })
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// The keyring branch of `create_store`, with the backend swapped out.
    async fn open_verified(
        store: Arc<dyn SecretStore>,
    ) -> Result<Arc<dyn SecretStore>, StoreError> {
        verify_round_trip(store.as_ref()).await?;
        Ok(store)
    }

    #[tokio::test]
    async fn test_verify_round_trip() {
        let memory = MemoryStore::new();
        verify_round_trip(&memory).await.unwrap();
        // The check entry is cleaned up
        assert!(memory.get(CHECK_KEY).await.unwrap().is_none());

        assert!(matches!(
            verify_round_trip(&ForgetfulStore).await,
            Err(StoreError::KeyringUnavailable { .. })
        ));
        assert!(matches!(
            verify_round_trip(&ReadOnlyStore).await,
            Err(StoreError::KeyringUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_keyring_falls_back_to_file() {
        for broken in [
            Arc::new(ForgetfulStore) as Arc<dyn SecretStore>,
            Arc::new(ReadOnlyStore) as Arc<dyn SecretStore>,
        ] {
            let dir = tempfile::tempdir().unwrap();
            let store = select_store(StoreBackend::Keyring, dir.path(), open_verified(broken)).await;

            store
                .set("auth0_access_token", &Secret::new("abc123"))
                .await
                .unwrap();
            assert!(dir.path().join(FILE_STORE_NAME).exists());
        }
    }

    #[tokio::test]
    async fn test_working_keyring_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let keyring: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
        let store = select_store(StoreBackend::Keyring, dir.path(), open_verified(keyring)).await;

        store
            .set("auth0_access_token", &Secret::new("abc123"))
            .await
            .unwrap();
        assert!(!dir.path().join(FILE_STORE_NAME).exists());
    }

    #[tokio::test]
    async fn test_create_store_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(StoreBackend::Memory, dir.path()).await;

        store.set("test-key", &Secret::new("test")).await.unwrap();
        let retrieved = store.get("test-key").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "test");

        // Nothing is written to disk
        assert!(!dir.path().join(FILE_STORE_NAME).exists());
    }

    #[tokio::test]
    async fn test_create_store_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(StoreBackend::File, dir.path()).await;

        store.set("test-key", &Secret::new("test")).await.unwrap();
        assert!(dir.path().join(FILE_STORE_NAME).exists());
    }
}
