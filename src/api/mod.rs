//! REST API layer: the route table, handlers, DTOs and router composition.
//!
//! Every request reaches the gateway's own ordered [`RouteTable`] through a
//! single axum fallback, so preflights, authentication and error envelopes
//! are handled in one place.

pub mod dto;
pub mod handlers;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::routing::{RouteTable, dispatch, handler};
use crate::stream;

use handlers::{openapi, posts, profile, rooms, users};

/// The gateway's routes, in match order.
#[must_use]
pub fn route_table() -> RouteTable<AppState> {
    RouteTable::new()
        .get("/events", handler(stream::events))
        .get("/posts", handler(posts::list_posts))
        .post("/posts", handler(posts::create_post))
        .get("/rooms", handler(rooms::list_rooms))
        .post("/rooms", handler(rooms::create_room))
        .get("/rooms/{id}", handler(rooms::get_room))
        .put("/rooms/{id}", handler(rooms::update_room))
        .get("/users", handler(users::list_users))
        .get("/users/{id}", handler(users::get_user))
        .get("/profile", handler(profile::get_profile))
        .post("/profile", handler(profile::save_profile))
        .get("/openapi.json", handler(openapi::openapi_json))
}

/// Builds the axum router: everything goes through [`dispatch`].
pub fn build_router() -> Router<AppState> {
    Router::new().fallback(dispatch)
}

/// The complete application with state and HTTP tracing applied.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
