//! REST endpoint handlers organized by resource.
//!
//! Handlers take the shared [`AppState`](crate::app_state::AppState) and
//! the request's [`RequestContext`]; authentication and routing have
//! already happened by the time they run.

pub mod openapi;
pub mod posts;
pub mod profile;
pub mod rooms;
pub mod users;

use crate::domain::{Entity, RecordId, Stored};
use crate::error::GatewayError;
use crate::routing::RequestContext;

/// The record id in the first path capture.
fn path_id(ctx: &RequestContext, what: &str) -> Result<RecordId, GatewayError> {
    RecordId::parse_argument(ctx.capture(0).unwrap_or_default(), what)
}

/// Rejects tombstoned records as missing.
fn require_live<T: Entity>(stored: Stored<T>) -> Result<Stored<T>, GatewayError> {
    if stored.record.is_deleted() {
        return Err(GatewayError::NotFound(format!("{} not found", T::NAME)));
    }
    Ok(stored)
}
