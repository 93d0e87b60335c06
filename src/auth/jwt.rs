//! HMAC-signed JWTs carrying a `phone_number` claim.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;

use super::provider::{IdentityProvider, VerifyError};
use crate::config::JwtSettings;
use crate::domain::PhoneNumber;

/// Claims the gateway reads. Anything else in the token is ignored.
#[derive(Debug, Deserialize)]
struct Claims {
    phone_number: Option<String>,
}

/// Verifies HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityProvider {
    /// Creates a provider from `settings`.
    ///
    /// Expiry is always enforced; the issuer only when configured.
    #[must_use]
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::default();
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<PhoneNumber, VerifyError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(e.to_string()),
            }
        })?;
        data.claims
            .phone_number
            .as_deref()
            .and_then(PhoneNumber::parse)
            .ok_or(VerifyError::MissingIdentity)
    }
}
