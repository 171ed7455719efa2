//! Credential storage with an availability-first failure policy.
//!
//! [`CredentialStore`] wraps whichever [`SecretStore`] backend was selected at
//! startup and exposes get/set/remove over the fixed set of
//! [`CredentialKey`]s. Backend failures never reach the caller: a failed read
//! looks like a missing value and a failed write or delete is logged and
//! dropped. The worst outcome is that the user has to log in again.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::store::{Secret, SecretStore};

/// Logical names under which credentials are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    /// JSON-serialized user profile.
    User,
    /// Bearer token for the SafeRoute API.
    AccessToken,
    /// Refresh token issued alongside the access token.
    RefreshToken,
    /// Persistent install identifier.
    DeviceId,
}

impl CredentialKey {
    /// Keys cleared on logout. The device id outlives sessions.
    pub const SESSION: [CredentialKey; 3] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::User,
    ];

    /// Storage key as written to the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::User => "auth0_user",
            CredentialKey::AccessToken => "auth0_access_token",
            CredentialKey::RefreshToken => "auth0_refresh_token",
            CredentialKey::DeviceId => "saferoute_device_id",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get/set/remove over named secrets.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecretStore>,
}

impl CredentialStore {
    /// Wrap a backend chosen by [`create_store`](crate::store::create_store).
    pub fn new(backend: Arc<dyn SecretStore>) -> Self {
        Self { backend }
    }

    /// Convenience constructor for an owned backend.
    pub fn from_store(store: impl SecretStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }

    /// Read a credential. `None` if absent or if the backend failed.
    pub async fn get(&self, key: CredentialKey) -> Option<Secret> {
        match self.backend.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Credential read failed, treating as absent");
                None
            }
        }
    }

    /// Write a credential, overwriting any previous value.
    pub async fn set(&self, key: CredentialKey, value: impl Into<String>) {
        let secret = Secret::new(value);
        match self.backend.set(key.as_str(), &secret).await {
            Ok(()) => debug!(key = %key, "Credential stored"),
            Err(e) => warn!(key = %key, error = %e, "Credential write failed, ignoring"),
        }
    }

    /// Delete a credential. Removing a missing key is not an error.
    pub async fn remove(&self, key: CredentialKey) {
        match self.backend.delete(key.as_str()).await {
            Ok(()) => debug!(key = %key, "Credential removed"),
            Err(e) => warn!(key = %key, error = %e, "Credential delete failed, ignoring"),
        }
    }

    /// Read and decode a JSON credential. Undecodable values count as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: CredentialKey) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(raw.expose()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Stored credential is not valid JSON");
                None
            }
        }
    }

    /// Encode a value as JSON and store it.
    pub async fn set_json<T: Serialize>(&self, key: CredentialKey, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.set(key, json).await,
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize credential"),
        }
    }

    /// Remove every session credential (tokens and profile).
    pub async fn clear_session(&self) {
        for key in CredentialKey::SESSION {
            self.remove(key).await;
        }
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use serde::Deserialize;

    /// Backend where every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl SecretStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Secret>, StoreError> {
            Err(StoreError::BackendError {
                message: "unavailable".to_string(),
            })
        }

        async fn set(&self, _key: &str, _secret: &Secret) -> Result<(), StoreError> {
            Err(StoreError::BackendError {
                message: "unavailable".to_string(),
            })
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::BackendError {
                message: "unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_key_names() {
        assert_eq!(CredentialKey::User.as_str(), "auth0_user");
        assert_eq!(CredentialKey::AccessToken.as_str(), "auth0_access_token");
        assert_eq!(CredentialKey::RefreshToken.as_str(), "auth0_refresh_token");
        assert_eq!(CredentialKey::DeviceId.as_str(), "saferoute_device_id");
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = CredentialStore::from_store(MemoryStore::new());
        assert!(store.get(CredentialKey::AccessToken).await.is_none());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_special_characters() {
        let store = CredentialStore::from_store(MemoryStore::new());
        let value = r#"{"name":"Jane \"JJ\" Doe","bio":"line1\nline2\t\\ü"}"#;

        store.set(CredentialKey::User, value).await;
        let retrieved = store.get(CredentialKey::User).await.unwrap();
        assert_eq!(retrieved.expose(), value);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = CredentialStore::from_store(MemoryStore::new());
        store.set(CredentialKey::AccessToken, "old").await;
        store.set(CredentialKey::AccessToken, "new").await;

        let token = store.get(CredentialKey::AccessToken).await.unwrap();
        assert_eq!(token.expose(), "new");
    }

    #[tokio::test]
    async fn test_remove() {
        let store = CredentialStore::from_store(MemoryStore::new());
        store.set(CredentialKey::RefreshToken, "r").await;
        store.remove(CredentialKey::RefreshToken).await;
        store.remove(CredentialKey::RefreshToken).await;
        assert!(store.get(CredentialKey::RefreshToken).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failures_are_swallowed() {
        let store = CredentialStore::from_store(BrokenStore);

        store.set(CredentialKey::AccessToken, "abc").await;
        assert!(store.get(CredentialKey::AccessToken).await.is_none());
        store.remove(CredentialKey::AccessToken).await;
        store.clear_session().await;
    }

    #[tokio::test]
    async fn test_json_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Profile {
            sub: String,
            name: String,
        }

        let store = CredentialStore::from_store(MemoryStore::new());
        let profile = Profile {
            sub: "auth0|1".to_string(),
            name: "Jane".to_string(),
        };

        store.set_json(CredentialKey::User, &profile).await;
        let loaded: Profile = store.get_json(CredentialKey::User).await.unwrap();
        assert_eq!(loaded, profile);

        store.set(CredentialKey::User, "not json").await;
        let broken: Option<Profile> = store.get_json(CredentialKey::User).await;
        assert!(broken.is_none());
    }

    #[tokio::test]
    async fn test_clear_session_keeps_device_id() {
        let store = CredentialStore::from_store(MemoryStore::new());
        store.set(CredentialKey::AccessToken, "a").await;
        store.set(CredentialKey::RefreshToken, "r").await;
        store.set(CredentialKey::User, "{}").await;
        store.set(CredentialKey::DeviceId, "d").await;

        store.clear_session().await;

        assert!(store.get(CredentialKey::AccessToken).await.is_none());
        assert!(store.get(CredentialKey::RefreshToken).await.is_none());
        assert!(store.get(CredentialKey::User).await.is_none());
        assert!(store.get(CredentialKey::DeviceId).await.is_some());
    }
}
