//! Post handlers: list and create.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::DateTime;

use crate::api::dto::CreatePostRequest;
use crate::app_state::AppState;
use crate::domain::post::{PAGE_SIZE, ROOM_ID_FIELD};
use crate::domain::{Post, PostView, RecordId, Room};
use crate::error::{ErrorResponse, GatewayError};
use crate::routing::RequestContext;
use crate::store::{Order, Query, typed};

use super::require_live;

/// `GET /posts`: Newest posts first, optionally within one room and
/// before a creation time.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] for a malformed `roomId` or
/// `createdBefore`.
#[utoipa::path(
    get,
    path = "/posts",
    tag = "Posts",
    summary = "List posts",
    description = "Returns up to 25 posts ordered by creation time, newest first. Deleted posts appear as tombstones.",
    params(
        ("roomId" = Option<String>, Query, description = "Only posts in this room"),
        ("createdBefore" = Option<i64>, Query, description = "Only posts created before this Unix time (seconds)"),
    ),
    responses(
        (status = 200, description = "Posts", body = Vec<PostView>),
        (status = 422, description = "Invalid query parameter", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_posts(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let mut query = Query::new()
        .order_by(Order::CreatedDesc)
        .limit(PAGE_SIZE);
    if let Some(raw) = ctx.param("roomId") {
        let room_id = RecordId::parse_argument(raw, "room")?;
        query = query.filter(ROOM_ID_FIELD, room_id.to_string());
    }
    if let Some(raw) = ctx.param("createdBefore") {
        let before = raw
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| GatewayError::InvalidArgument("Invalid createdBefore".into()))?;
        query = query.created_before(before);
    }

    let posts = typed::find::<Post>(state.store.as_ref(), &query).await?;
    tracing::info!(
        room_id = ctx.param("roomId"),
        created_before = ctx.param("createdBefore"),
        count = posts.len(),
        "posts queried"
    );
    Ok(Json(posts.iter().map(Post::view).collect::<Vec<_>>()))
}

/// `POST /posts`: Create a post in an existing room.
///
/// # Errors
///
/// Returns [`GatewayError::PermissionDenied`] without a profile,
/// [`GatewayError::InvalidArgument`] for a bad room id or sections, and
/// [`GatewayError::NotFound`] if the room does not exist.
#[utoipa::path(
    post,
    path = "/posts",
    tag = "Posts",
    summary = "Create a post",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostView),
        (status = 403, description = "Caller has no profile", body = ErrorResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
        (status = 422, description = "Invalid room id or sections", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_post(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let author = ctx.require_user()?.id();
    let request: CreatePostRequest = ctx.json().await?;

    let room_id = RecordId::parse_argument(request.room_id.as_deref().unwrap_or_default(), "room")?;
    require_live(typed::fetch::<Room>(state.store.as_ref(), room_id).await?)?;

    let post = Post::create(author, room_id, &request.sections.unwrap_or_default())?;
    typed::save(state.store.as_ref(), &post).await?;

    tracing::info!(id = %post.id(), %room_id, %author, "post created");
    Ok((StatusCode::CREATED, Json(Post::view(&post))))
}
