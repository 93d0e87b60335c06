//! OpenAPI document for the gateway.

use axum::Json;
use axum::response::IntoResponse;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::dto::{CreatePostRequest, CreateRoomRequest, ProfileRequest, UpdateRoomRequest};
use crate::app_state::AppState;
use crate::domain::{
    PermissionType, PermissionView, PostSection, PostView, ProfileView, RecordView, RoomView,
    UserView,
};
use crate::error::{ErrorResponse, GatewayError};
use crate::routing::RequestContext;

/// Generated API description.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "neon gateway", description = "Users, rooms, posts and live change events"),
    paths(
        crate::stream::handler::events,
        super::posts::list_posts,
        super::posts::create_post,
        super::rooms::list_rooms,
        super::rooms::create_room,
        super::rooms::get_room,
        super::rooms::update_room,
        super::users::list_users,
        super::users::get_user,
        super::profile::get_profile,
        super::profile::save_profile,
        openapi_json,
    ),
    components(schemas(
        CreatePostRequest,
        CreateRoomRequest,
        UpdateRoomRequest,
        ProfileRequest,
        PostView,
        PostSection,
        RoomView,
        UserView,
        ProfileView,
        RecordView,
        PermissionType,
        PermissionView,
        ErrorResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Events", description = "Server-Sent Events stream of post and user changes"),
        (name = "Posts", description = "Posts within rooms"),
        (name = "Rooms", description = "Rooms and their moderation grants"),
        (name = "Users", description = "Public user lookup"),
        (name = "Profile", description = "The caller's own user"),
        (name = "System", description = "Service metadata"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by every path.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// `GET /openapi.json`: This document.
///
/// # Errors
///
/// Never fails once past the gate.
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "System",
    summary = "OpenAPI document",
    responses((status = 200, description = "OpenAPI 3.1 document", content_type = "application/json")),
    security(("bearer" = []))
)]
pub async fn openapi_json(
    _state: AppState,
    _ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(ApiDoc::openapi()))
}
