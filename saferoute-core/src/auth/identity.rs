//! Identity provider client.
//!
//! Wraps the three tenant endpoints the app consumes:
//!
//! - `POST /oauth/token` (resource owner password grant)
//! - `GET /userinfo`
//! - `GET /authorize` (hosted login page, driven by an [`InteractiveAuthorizer`])

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::config::IdentityConfig;

use super::{AuthError, UserProfile};

/// Timeout for identity provider calls.
const IDENTITY_TIMEOUT_SECS: u64 = 30;

/// Shown on the hosted sign-up page.
const SIGNUP_LOGIN_HINT: &str = "Please provide your full name and ensure passwords match";

/// Fallback message when the token endpoint gives no usable reason.
const GENERIC_LOGIN_FAILURE: &str = "Login failed. Please try again.";

/// Tokens issued by the provider.
#[derive(Clone, Deserialize)]
pub struct AuthCredentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AuthCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
            token_type: default_token_type(),
            expires_in: None,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

impl TokenErrorBody {
    fn into_auth_error(self) -> AuthError {
        match self.error.as_deref() {
            Some("invalid_grant") => AuthError::InvalidCredentials,
            Some("access_denied") => AuthError::AccessDenied,
            _ => AuthError::Rejected {
                message: self
                    .error_description
                    .or(self.message)
                    .unwrap_or_else(|| GENERIC_LOGIN_FAILURE.to_string()),
            },
        }
    }
}

/// Parameters for the hosted login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: String,
    pub audience: String,
    /// Always `login`, so a cached provider session cannot skip the form.
    pub prompt: String,
    /// `signup` to open the registration tab.
    pub screen_hint: Option<String>,
    /// Guidance shown on the registration tab; only set with `screen_hint`.
    pub login_hint: Option<String>,
}

/// The hosted login page, implemented by the embedding app.
#[async_trait]
pub trait InteractiveAuthorizer: Send + Sync {
    /// Run the hosted login flow and return the issued tokens.
    ///
    /// Return [`AuthError::Cancelled`] if the user backs out.
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<AuthCredentials, AuthError>;

    /// Drop the provider's browser session cookie.
    async fn clear_session(&self) -> Result<(), AuthError>;
}

/// Result of setting up the identity provider.
///
/// Missing configuration is reported here once, as a value, instead of
/// failing later inside a login attempt.
#[derive(Debug)]
pub enum IdentityProvider {
    Ready(IdentityClient),
    Unavailable { reason: String },
}

impl IdentityProvider {
    pub fn init(config: &IdentityConfig) -> Self {
        if let Some(reason) = config.missing_setting() {
            warn!("Identity provider unavailable: {}", reason);
            return IdentityProvider::Unavailable {
                reason: reason.to_string(),
            };
        }

        match IdentityClient::new(config.clone()) {
            Ok(client) => {
                debug!(issuer = %client.issuer_url(), "Identity provider ready");
                IdentityProvider::Ready(client)
            }
            Err(e) => {
                warn!("Identity provider unavailable: {}", e);
                IdentityProvider::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, IdentityProvider::Ready(_))
    }

    pub fn client(&self) -> Result<&IdentityClient, AuthError> {
        match self {
            IdentityProvider::Ready(client) => Ok(client),
            IdentityProvider::Unavailable { reason } => Err(AuthError::Unavailable {
                reason: reason.clone(),
            }),
        }
    }
}

/// HTTP client for the tenant's authentication API.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: Client,
    config: IdentityConfig,
    issuer: String,
}

impl IdentityClient {
    fn new(config: IdentityConfig) -> Result<Self, AuthError> {
        let issuer = config.issuer_url();
        Url::parse(&issuer).map_err(|e| AuthError::Unavailable {
            reason: format!("invalid identity domain {:?}: {}", config.domain, e),
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(IDENTITY_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Unavailable {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            config,
            issuer,
        })
    }

    pub fn issuer_url(&self) -> &str {
        &self.issuer
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Exchange a username and password for tokens.
    pub async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthCredentials, AuthError> {
        let url = format!("{}/oauth/token", self.issuer);
        let username = username.trim();
        debug!("Requesting password grant");

        let body = json!({
            "grant_type": "password",
            "username": username,
            "password": password,
            "client_id": self.config.client_id,
            "scope": self.config.scope,
            "realm": self.config.realm,
            "audience": self.config.audience(),
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Password grant rejected");
            return Err(match serde_json::from_str::<TokenErrorBody>(&text) {
                Ok(body) => body.into_auth_error(),
                Err(_) => AuthError::Rejected {
                    message: GENERIC_LOGIN_FAILURE.to_string(),
                },
            });
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Decode {
            message: format!("token response: {}", e),
        })
    }

    /// Fetch the profile for `access_token`.
    pub async fn user_info(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let url = format!("{}/userinfo", self.issuer);

        let response = self.http.get(&url).bearer_auth(access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::UserInfo {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| AuthError::Decode {
            message: format!("user info: {}", e),
        })
    }

    /// Parameters for the hosted login page.
    pub fn authorize_request(&self, signup: bool) -> AuthorizeRequest {
        AuthorizeRequest {
            client_id: self.config.client_id.clone(),
            scope: self.config.scope.clone(),
            redirect_uri: self.config.redirect_uri.clone(),
            audience: self.config.audience(),
            prompt: "login".to_string(),
            screen_hint: signup.then(|| "signup".to_string()),
            login_hint: signup.then(|| SIGNUP_LOGIN_HINT.to_string()),
        }
    }

    /// Full `/authorize` URL for `request`.
    pub fn authorize_url(&self, request: &AuthorizeRequest) -> Result<Url, AuthError> {
        let mut url = Url::parse(&format!("{}/authorize", self.issuer)).map_err(|e| {
            AuthError::Unavailable {
                reason: format!("invalid authorize URL: {}", e),
            }
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &request.client_id)
                .append_pair("redirect_uri", &request.redirect_uri)
                .append_pair("scope", &request.scope)
                .append_pair("audience", &request.audience)
                .append_pair("prompt", &request.prompt);
            if let Some(hint) = &request.screen_hint {
                query.append_pair("screen_hint", hint);
            }
            if let Some(hint) = &request.login_hint {
                query.append_pair("login_hint", hint);
            }
        }

        Ok(url)
    }
}
