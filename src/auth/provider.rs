//! Identity provider interface.

use async_trait::async_trait;

use crate::domain::PhoneNumber;

/// Why a credential was rejected. Never shown to clients.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The token is unknown, malformed, or has a bad signature.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The token was valid once but has expired.
    #[error("token expired")]
    Expired,

    /// The token verified but carries no usable identity.
    #[error("token has no usable phone number")]
    MissingIdentity,
}

/// Verifies bearer credentials and yields the external identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    /// Verifies `token`.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] describing why the token was rejected.
    async fn verify(&self, token: &str) -> Result<PhoneNumber, VerifyError>;
}
