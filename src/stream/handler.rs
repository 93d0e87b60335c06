//! `GET /events`: the Server-Sent-Events endpoint.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;

use super::fanout;
use crate::app_state::AppState;
use crate::error::GatewayError;
use crate::routing::RequestContext;

/// Query parameter carrying the replay cursor, in Unix seconds.
pub const CURSOR_PARAM: &str = "lastTs";

/// Opens an event stream for the caller.
///
/// The response stays open until the client disconnects, the caller's
/// change feed fails, or the server shuts down.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    params(("lastTs" = i64, Query, description = "Replay changes made at or after this Unix time (seconds)")),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Missing or invalid credential", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid lastTs", body = crate::error::ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn events(state: AppState, ctx: RequestContext) -> Result<Response, GatewayError> {
    let identity = ctx.require_identity()?.clone();
    let since = parse_cursor(ctx.param(CURSOR_PARAM))?;

    let stream = fanout::open(&state.event_bus, state.store.as_ref(), identity, since).await?;
    let frames = stream.map(|frame| Ok::<_, Infallible>(Event::from(frame)));

    Ok(Sse::new(frames)
        .keep_alive(KeepAlive::new().interval(state.config.sse_keep_alive))
        .into_response())
}

/// Parses a cursor of decimal Unix seconds.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] if the cursor is missing, not
/// all digits, or out of range.
pub fn parse_cursor(raw: Option<&str>) -> Result<DateTime<Utc>, GatewayError> {
    raw.filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| GatewayError::InvalidArgument("Invalid lastTs".to_string()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn cursor_must_be_unix_seconds() {
        let Ok(at) = parse_cursor(Some("1700000000")) else {
            panic!("valid cursor");
        };
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert!(parse_cursor(Some("0")).is_ok());

        for bad in [None, Some(""), Some("-5"), Some("17e8"), Some("abc1"), Some("99999999999999999999")] {
            assert!(
                matches!(parse_cursor(bad), Err(GatewayError::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
