//! Top-level error types for SafeRoute.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Top-level error type encompassing all SafeRoute errors.
#[derive(Debug, Error)]
pub enum SafeRouteError {
    /// Error from configuration loading.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from a secret storage backend.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from an API dispatch.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Error from the identity provider.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
}
