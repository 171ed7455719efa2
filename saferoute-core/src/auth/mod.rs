//! Identity provider integration.
//!
//! This module provides:
//! - [`IdentityProvider`] - Explicit init result: a ready client or an unavailable reason
//! - [`IdentityClient`] - Password grant, user info and hosted-login URL building
//! - [`InteractiveAuthorizer`] - Trait for the hosted login page collaborator
//! - [`AuthSession`] - Stores and clears credentials around those calls
//! - [`UserProfile`] - The provider's user-info document

pub mod identity;
pub mod profile;
pub mod session;

use thiserror::Error;

pub use identity::{
    AuthCredentials, AuthorizeRequest, IdentityClient, IdentityProvider, InteractiveAuthorizer,
};
pub use profile::UserProfile;
pub use session::{AuthSession, PROFILE_ENDPOINT};

/// Error type for authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider is not configured or could not be initialized.
    #[error("identity provider unavailable: {reason}")]
    Unavailable { reason: String },

    /// The provider rejected the username/password pair.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The account exists but may not sign in.
    #[error("Account access has been denied")]
    AccessDenied,

    /// Any other rejection from the token endpoint.
    #[error("{message}")]
    Rejected { message: String },

    /// The user-info endpoint did not answer with a profile.
    #[error("Failed to fetch user information (status {status})")]
    UserInfo { status: u16 },

    /// The user closed the hosted login page.
    #[error("login cancelled by user")]
    Cancelled,

    /// The interactive authorizer failed for another reason.
    #[error("authorizer error: {message}")]
    Authorizer { message: String },

    /// Transport failure talking to the provider.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with something that is not the expected JSON.
    #[error("unexpected response from identity provider: {message}")]
    Decode { message: String },
}
