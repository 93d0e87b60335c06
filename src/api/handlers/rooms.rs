//! Room handlers: list, fetch, create, update.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::api::dto::{CreateRoomRequest, UpdateRoomRequest};
use crate::app_state::AppState;
use crate::domain::room::{MEMBER_COUNT_FIELD, NAME_FIELD};
use crate::domain::validate::require_name;
use crate::domain::{Room, RoomView};
use crate::error::{ErrorResponse, GatewayError};
use crate::routing::RequestContext;
use crate::store::{Order, Query, typed};

use super::{path_id, require_live};

/// The only accepted `sort` value.
const SORT_MEMBER_COUNT_DESC: &str = "member_count_desc";

/// `GET /rooms`: Rooms, optionally filtered by exact name and sorted by
/// member count.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] for a malformed name or an
/// unknown sort option.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "Rooms",
    summary = "List rooms",
    params(
        ("name" = Option<String>, Query, description = "Exact room name"),
        ("sort" = Option<String>, Query, description = "`member_count_desc`"),
    ),
    responses(
        (status = 200, description = "Rooms", body = Vec<RoomView>),
        (status = 422, description = "Invalid name or sort option", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_rooms(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let mut query = Query::new();
    if let Some(name) = ctx.param("name") {
        let name = require_name(Some(name.to_string()), "Invalid room name")?;
        query = query.filter(NAME_FIELD, name);
    }
    match ctx.param("sort") {
        None => {}
        Some(SORT_MEMBER_COUNT_DESC) => {
            query = query.order_by(Order::FieldDesc(MEMBER_COUNT_FIELD.to_string()));
        }
        Some(_) => return Err(GatewayError::InvalidArgument("Invalid sort option".into())),
    }

    let rooms = typed::find::<Room>(state.store.as_ref(), &query).await?;
    tracing::info!(
        name = ctx.param("name"),
        sort = ctx.param("sort"),
        count = rooms.len(),
        "rooms queried"
    );
    Ok(Json(rooms.iter().map(Room::view).collect::<Vec<_>>()))
}

/// `GET /rooms/{id}`: One room.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] for a malformed id and
/// [`GatewayError::NotFound`] if the room does not exist.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "Rooms",
    summary = "Get a room",
    params(("id" = String, Path, description = "Room id (hyphenated UUID)")),
    responses(
        (status = 200, description = "Room", body = RoomView),
        (status = 404, description = "Room not found", body = ErrorResponse),
        (status = 422, description = "Invalid room id", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_room(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let id = path_id(&ctx, "room")?;
    let room = require_live(typed::fetch::<Room>(state.store.as_ref(), id).await?)?;
    tracing::info!(%id, "room fetched");
    Ok(Json(Room::view(&room)))
}

/// `POST /rooms`: Create a room owned by the caller.
///
/// # Errors
///
/// Returns [`GatewayError::PermissionDenied`] without a profile,
/// [`GatewayError::InvalidArgument`] for a malformed name, and
/// [`GatewayError::AlreadyExists`] if the name is taken.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "Rooms",
    summary = "Create a room",
    description = "Creates a room with the caller as its first member. The creator is granted the ban, censor and edit permissions.",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomView),
        (status = 403, description = "Caller has no profile", body = ErrorResponse),
        (status = 409, description = "Room name already taken", body = ErrorResponse),
        (status = 422, description = "Invalid room name", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_room(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let creator = ctx.require_user()?.id();
    let request: CreateRoomRequest = ctx.json().await?;
    let room = Room::create(
        creator,
        request.name,
        request.description,
        request.background_path,
    )?;

    let taken = Query::new().filter(NAME_FIELD, room.fields.name.clone());
    let existing = typed::find::<Room>(state.store.as_ref(), &taken).await?;
    if existing.iter().any(|r| !r.record.is_deleted()) {
        return Err(GatewayError::AlreadyExists("Room name already taken".into()));
    }

    typed::save(state.store.as_ref(), &room).await?;
    tracing::info!(id = %room.id(), name = %room.fields.name, %creator, "room created");
    Ok((StatusCode::CREATED, Json(Room::view(&room))))
}

/// `PUT /rooms/{id}`: Change a room's background or description.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] for a malformed id,
/// [`GatewayError::NotFound`] if the room does not exist, and
/// [`GatewayError::PermissionDenied`] unless the caller holds the edit
/// permission.
#[utoipa::path(
    put,
    path = "/rooms/{id}",
    tag = "Rooms",
    summary = "Update a room",
    params(("id" = String, Path, description = "Room id (hyphenated UUID)")),
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Room updated", body = RoomView),
        (status = 403, description = "Missing edit permission", body = ErrorResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
        (status = 422, description = "Invalid room id", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_room(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let id = path_id(&ctx, "room")?;
    let actor = ctx.require_user()?.id();
    let mut room = require_live(typed::fetch::<Room>(state.store.as_ref(), id).await?)?;

    let request: UpdateRoomRequest = ctx.json().await?;
    Room::edit(&mut room, actor, request.background_path, request.description)?;
    typed::save(state.store.as_ref(), &room).await?;

    tracing::info!(%id, %actor, "room updated");
    Ok(Json(Room::view(&room)))
}

