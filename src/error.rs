//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to one class of the error taxonomy and renders the JSON envelope
//! `{ "error": "<message>" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Message returned to clients for every unclassified failure.
pub const SERVER_ERROR_MESSAGE: &str = "Server-side error";

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// { "error": "Room not found" }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// | Variant            | HTTP Status                  |
/// |--------------------|------------------------------|
/// | `InvalidArgument`  | 422 Unprocessable Entity     |
/// | `Unauthorized`     | 401 Unauthorized             |
/// | `PermissionDenied` | 403 Forbidden                |
/// | `NotFound`         | 404 Not Found                |
/// | `AlreadyExists`    | 409 Conflict                 |
/// | `Store`/`Internal` | 500 Internal Server Error    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed input: bad body, bad cursor, bad path id.
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing or invalid credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not entitled to the operation.
    #[error("{0}")]
    PermissionDenied(String),

    /// No matching route or resource.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness conflict.
    #[error("{0}")]
    AlreadyExists(String),

    /// Document store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The error returned when no route matches a request.
    #[must_use]
    pub fn route_not_found() -> Self {
        Self::NotFound("Page not found".to_string())
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for errors outside the client-facing taxonomy.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Internal(_))
    }

    /// Message safe to show to the client. Server errors are replaced
    /// with a generic message.
    #[must_use]
    pub fn client_message(&self) -> String {
        if self.is_server_error() {
            SERVER_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        let body = ErrorResponse {
            error: self.client_message(),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("failed to read body");
        };
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("body is not JSON");
        };
        value
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (GatewayError::InvalidArgument("x".into()), 422),
            (GatewayError::Unauthorized, 401),
            (GatewayError::PermissionDenied("x".into()), 403),
            (GatewayError::NotFound("x".into()), 404),
            (GatewayError::AlreadyExists("x".into()), 409),
            (GatewayError::Internal("x".into()), 500),
            (GatewayError::Store(StoreError::FeedClosed), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code().as_u16(), status, "{error:?}");
        }
    }

    #[tokio::test]
    async fn envelope_carries_client_message() {
        let response = GatewayError::NotFound("Room not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({ "error": "Room not found" }));
    }

    #[tokio::test]
    async fn server_errors_hide_detail() {
        let response =
            GatewayError::Internal("connection refused at 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({ "error": SERVER_ERROR_MESSAGE }));
    }

    #[test]
    fn unauthorized_message_is_fixed() {
        assert_eq!(GatewayError::Unauthorized.client_message(), "Unauthorized");
    }
}
