//! Wiring of the components from a resolved [`AppConfig`].

use crate::api::ApiClient;
use crate::auth::{AuthSession, IdentityProvider};
use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::error::SafeRouteError;
use crate::store::create_store;

/// Select and verify the storage backend, then build the API client and auth session.
///
/// Call once at startup. The returned session owns the only [`ApiClient`]
/// clones need; clone it from [`AuthSession::api`] for concurrent callers.
pub async fn connect(config: &AppConfig) -> Result<AuthSession, SafeRouteError> {
    tracing::debug!(
        platform = %config.platform,
        storage = %config.storage,
        base_url = %config.api.base_url(),
        "Initializing SafeRoute client"
    );

    let backend = create_store(config.storage, &config.data_dir).await;
    let credentials = CredentialStore::new(backend);
    let api = ApiClient::new(config.api.clone(), credentials)?;
    let provider = IdentityProvider::init(&config.identity);

    Ok(AuthSession::new(provider, api))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreBackend;

    #[tokio::test]
    async fn test_connect_with_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            AppConfig::load_from_path(dir.path().join("config.toml"), |_| None).unwrap();
        config.storage = StoreBackend::Memory;

        let session = connect(&config).await.unwrap();
        assert!(!session.provider().is_available());
        assert!(!session.is_authenticated().await);
        assert_eq!(session.api().config().base_url(), config.api.base_url());
    }
}
