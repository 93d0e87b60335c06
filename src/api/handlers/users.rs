//! User lookup handlers.

use axum::Json;
use axum::response::IntoResponse;

use crate::app_state::AppState;
use crate::domain::user::USERNAME_FIELD;
use crate::domain::validate::require_name;
use crate::domain::{User, UserView};
use crate::error::{ErrorResponse, GatewayError};
use crate::routing::RequestContext;
use crate::store::{Query, typed};

use super::path_id;

/// `GET /users?username=`: Users with exactly this username.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] if `username` is missing or
/// malformed.
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    summary = "Find users by username",
    params(("username" = String, Query, description = "Exact username")),
    responses(
        (status = 200, description = "Matching users", body = Vec<UserView>),
        (status = 422, description = "Invalid username", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_users(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let username = require_name(ctx.param("username").map(str::to_string), "Invalid username")?;
    let query = Query::new().filter(USERNAME_FIELD, username.as_str());
    let users = typed::find::<User>(state.store.as_ref(), &query).await?;
    tracing::info!(%username, count = users.len(), "users queried");
    Ok(Json(users.iter().map(User::public_view).collect::<Vec<_>>()))
}

/// `GET /users/{id}`: One user, without the phone number.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] for a malformed id and
/// [`GatewayError::NotFound`] if the user does not exist.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    summary = "Get a user",
    params(("id" = String, Path, description = "User id (hyphenated UUID)")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Invalid user id", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_user(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let id = path_id(&ctx, "user")?;
    let user = typed::fetch::<User>(state.store.as_ref(), id).await?;
    tracing::info!(%id, "user fetched");
    Ok(Json(User::public_view(&user)))
}
