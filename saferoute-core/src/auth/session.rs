//! Login state backed by the credential store.
//!
//! A session is "authenticated" when a user profile is stored. Tokens and the
//! profile are written after a successful login and removed on logout; there
//! is no expiry tracking, a 401/403 from the backend is the signal to log in
//! again.

use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::credentials::{CredentialKey, CredentialStore};
use crate::store::Secret;

use super::{
    AuthCredentials, AuthError, IdentityClient, IdentityProvider, InteractiveAuthorizer,
    UserProfile,
};

/// Backend endpoint used to confirm the new token is accepted.
pub const PROFILE_ENDPOINT: &str = "/v1/users/me";

pub struct AuthSession {
    provider: IdentityProvider,
    api: ApiClient,
}

impl AuthSession {
    /// Tie the provider to the API client; credentials come from the client's store.
    pub fn new(provider: IdentityProvider, api: ApiClient) -> Self {
        Self { provider, api }
    }

    pub fn provider(&self) -> &IdentityProvider {
        &self.provider
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.api.credentials()
    }

    /// Load the stored profile, if any.
    pub async fn restore(&self) -> Option<UserProfile> {
        let profile = self
            .credentials()
            .get_json::<UserProfile>(CredentialKey::User)
            .await;
        match &profile {
            Some(p) => debug!(user = %p.display_name(), "Restored stored session"),
            None => debug!("No stored session"),
        }
        profile
    }

    pub async fn is_authenticated(&self) -> bool {
        self.restore().await.is_some()
    }

    pub async fn access_token(&self) -> Option<Secret> {
        self.credentials().get(CredentialKey::AccessToken).await
    }

    /// Log in with email and password.
    ///
    /// After storing tokens and profile, calls [`PROFILE_ENDPOINT`] once to
    /// confirm the backend accepts the token. That check only logs.
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        let client = self.provider.client()?;

        let credentials = client.password_grant(email, password).await?;
        let profile = self.complete_login(client, &credentials).await?;

        match self.api.get(PROFILE_ENDPOINT).await {
            Ok(_) => info!("Backend accepted the new session"),
            Err(e) => error!("Backend verification failed: {}", e),
        }

        Ok(profile)
    }

    /// Log in through the hosted login page.
    ///
    /// Returns `Ok(None)` if the user cancelled.
    pub async fn login_interactive(
        &self,
        authorizer: &dyn InteractiveAuthorizer,
        signup: bool,
    ) -> Result<Option<UserProfile>, AuthError> {
        let client = self.provider.client()?;
        let request = client.authorize_request(signup);

        let credentials = match authorizer.authorize(&request).await {
            Ok(credentials) => credentials,
            Err(AuthError::Cancelled) => {
                info!("User cancelled login");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.complete_login(client, &credentials).await.map(Some)
    }

    async fn complete_login(
        &self,
        client: &IdentityClient,
        credentials: &AuthCredentials,
    ) -> Result<UserProfile, AuthError> {
        // Nothing is stored until the profile is known.
        let profile = client.user_info(&credentials.access_token).await?;

        let store = self.credentials();
        store
            .set(CredentialKey::AccessToken, credentials.access_token.as_str())
            .await;
        match &credentials.refresh_token {
            Some(refresh) => store.set(CredentialKey::RefreshToken, refresh.as_str()).await,
            None => store.remove(CredentialKey::RefreshToken).await,
        }
        store.set_json(CredentialKey::User, &profile).await;

        info!(user = %profile.display_name(), "Login complete");
        Ok(profile)
    }

    /// End the provider's browser session. Failures are logged only.
    pub async fn clear_provider_session(&self, authorizer: &dyn InteractiveAuthorizer) {
        if !self.provider.is_available() {
            return;
        }
        if let Err(e) = authorizer.clear_session().await {
            warn!("Clear session error: {}", e);
        }
    }

    /// Remove tokens and profile. The device id is kept.
    pub async fn logout(&self) {
        self.credentials().clear_session().await;
        info!("Logout complete");
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("provider_available", &self.provider.is_available())
            .field("api", &self.api)
            .finish()
    }
}
