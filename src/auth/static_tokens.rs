//! Fixed token table, for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;

use super::provider::{IdentityProvider, VerifyError};
use crate::domain::PhoneNumber;

/// Maps opaque tokens to phone numbers.
#[derive(Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, PhoneNumber>,
}

impl std::fmt::Debug for StaticIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Tokens are credentials; only their count is logged.
        f.debug_struct("StaticIdentityProvider")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl StaticIdentityProvider {
    /// Creates a provider from a token table.
    #[must_use]
    pub const fn new(tokens: HashMap<String, PhoneNumber>) -> Self {
        Self { tokens }
    }

    /// Adds or replaces one token.
    #[cfg(test)]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, phone: PhoneNumber) -> Self {
        self.tokens.insert(token.into(), phone);
        self
    }}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<PhoneNumber, VerifyError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| VerifyError::Invalid("unknown static token".into()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_and_unknown_tokens() {
        let Some(phone) = PhoneNumber::parse("+15550001") else {
            panic!("valid phone");
        };
        let provider = StaticIdentityProvider::default().with_token("dev", phone.clone());
        assert!(matches!(provider.verify("dev").await, Ok(p) if p == phone));
        assert!(matches!(
            provider.verify("nope").await,
            Err(VerifyError::Invalid(_))
        ));
        assert!(!format!("{provider:?}").contains("dev"));
    }
}
