//! Authentication gate run before every non-preflight request.
//!
//! The credential comes from `Authorization: Bearer <token>`, or, when no
//! such header is sent, from a `token` query parameter (browsers cannot set
//! headers on an `EventSource`). Every failure is reported to the client as
//! a bare `Unauthorized`; the reason is only logged.

pub mod jwt;
pub mod provider;
pub mod static_tokens;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::config::GatewayConfig;
use crate::domain::PhoneNumber;
use crate::error::GatewayError;

pub use jwt::JwtIdentityProvider;
pub use provider::{IdentityProvider, VerifyError};
pub use static_tokens::StaticIdentityProvider;

/// Query parameter accepted in place of the `Authorization` header.
pub const TOKEN_QUERY_PARAM: &str = "token";

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts and verifies request credentials.
#[derive(Debug, Clone)]
pub struct AuthGate {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl AuthGate {
    /// Gate backed by a single provider.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            providers: vec![provider],
        }
    }

    /// Gate that tries each provider in order until one accepts.
    #[must_use]
    pub const fn chain(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Gate over every provider the configuration enables, JWT first.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut providers: Vec<Arc<dyn IdentityProvider>> = Vec::new();
        if let Some(jwt) = &config.jwt {
            providers.push(Arc::new(JwtIdentityProvider::new(jwt)));
        }
        if !config.static_tokens.is_empty() {
            providers.push(Arc::new(StaticIdentityProvider::new(
                config.static_tokens.clone(),
            )));
        }
        tracing::info!(providers = providers.len(), "identity providers configured");
        Self::chain(providers)
    }

    /// Authenticates a request from its headers and parsed query.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if no credential is present,
    /// the header is malformed, or every provider rejects the token.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        query: &HashMap<String, String>,
    ) -> Result<PhoneNumber, GatewayError> {
        let token = match bearer_token(headers)? {
            Some(token) => token,
            None => query
                .get(TOKEN_QUERY_PARAM)
                .map(String::as_str)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    tracing::debug!("no credential supplied");
                    GatewayError::Unauthorized
                })?,
        };

        for provider in &self.providers {
            match provider.verify(token).await {
                Ok(identity) => return Ok(identity),
                Err(e) => tracing::debug!(?provider, error = %e, "credential rejected"),
            }
        }
        Err(GatewayError::Unauthorized)
    }
}

/// Reads the bearer token from `Authorization`, if the header is present.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] if the header is present but is
/// not `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, GatewayError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or_else(|| {
            tracing::debug!("malformed authorization header");
            GatewayError::Unauthorized
        })
}
