//! Cross-origin headers.
//!
//! Preflights are answered from the route table (the advertised methods
//! are exactly those registered for the path), so `tower_http::cors` does
//! not fit; this policy only renders the headers.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

/// Request headers every preflight allows.
pub const ALLOWED_HEADERS: &str = "authorization, content-type";

/// Configured origins and how to echo them.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<HeaderValue>,
}

impl CorsPolicy {
    /// Builds a policy from origin strings. Origins that are not valid
    /// header values are skipped with a warning.
    #[must_use]
    pub fn new(origins: &[String]) -> Self {
        let allowed_origins = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(%origin, error = %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        Self { allowed_origins }
    }

    /// Origin to echo for a request: the request's own `Origin` when it is
    /// allowed, the first configured origin when the request sent none.
    #[must_use]
    pub fn origin_for(&self, request_headers: &HeaderMap) -> Option<HeaderValue> {
        match request_headers.get(ORIGIN) {
            Some(origin) => self.allowed_origins.iter().find(|o| *o == origin).cloned(),
            None => self.allowed_origins.first().cloned(),
        }
    }

    /// Adds origin and credentials headers to an actual response.
    pub fn decorate(&self, origin: Option<HeaderValue>, response: &mut Response) {
        let headers = response.headers_mut();
        if let Some(origin) = origin {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(VARY, HeaderValue::from_static("origin"));
    }

    /// `204 No Content` advertising `methods` and [`ALLOWED_HEADERS`].
    #[must_use]
    pub fn preflight(&self, origin: Option<HeaderValue>, methods: &[Method]) -> Response {
        let allow_methods = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&allow_methods) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        self.decorate(origin, &mut response);
        response
    }
}
