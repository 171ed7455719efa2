//! # SafeRoute Core
//!
//! Authenticated API access for the SafeRoute client.
//!
//! This crate provides:
//! - Credential storage over a backend chosen once at startup (keyring, file, memory)
//! - A persistent, single-flight device identifier
//! - [`ApiClient`], which decorates every backend call with the bearer token and device id
//! - Identity provider glue that fills and clears the credential store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use saferoute_core::{AppConfig, bootstrap};
//!
//! async fn whoami() -> Result<(), saferoute_core::SafeRouteError> {
//!     let config = AppConfig::load()?;
//!     let session = bootstrap::connect(&config).await?;
//!     let me: serde_json::Value = session.api().get_json("/v1/users/me").await?;
//!     println!("{}", me);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod store;

// Re-export commonly used types at crate root
pub use api::{ApiClient, ApiError, Method, RequestOptions};

pub use auth::{
    AuthCredentials,
    AuthError,
    AuthSession,
    AuthorizeRequest,
    IdentityClient,
    IdentityProvider,
    InteractiveAuthorizer,
    UserProfile,
};

pub use config::{ApiConfig, AppConfig, ConfigError, IdentityConfig, Platform};

pub use credentials::{CredentialKey, CredentialStore};

pub use device::DeviceIdentity;

pub use error::SafeRouteError;

pub use store::{
    FileStore,
    MemoryStore,
    Secret,
    SecretStore,
    StoreBackend,
    StoreError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;
