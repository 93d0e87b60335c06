//! The caller's own user record.

use axum::Json;
use axum::response::IntoResponse;

use crate::api::dto::ProfileRequest;
use crate::app_state::AppState;
use crate::domain::user::USERNAME_FIELD;
use crate::domain::{ProfileView, User};
use crate::error::{ErrorResponse, GatewayError};
use crate::routing::RequestContext;
use crate::store::{Query, typed};

/// `GET /profile`: The caller's user, including the phone number.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] until the caller registers.
#[utoipa::path(
    get,
    path = "/profile",
    tag = "Profile",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Profile", body = ProfileView),
        (status = 404, description = "Not registered yet", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_profile(
    _state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let user = ctx
        .current_user()
        .ok_or_else(|| GatewayError::NotFound("Profile not found".into()))?;
    Ok(Json(ProfileView::from(user)))
}

/// `POST /profile`: Register the caller, or update their username and
/// avatar.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidArgument`] for malformed fields and
/// [`GatewayError::AlreadyExists`] if another user has the username.
#[utoipa::path(
    post,
    path = "/profile",
    tag = "Profile",
    summary = "Create or update own profile",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = ProfileView),
        (status = 409, description = "Username already taken", body = ErrorResponse),
        (status = 422, description = "Invalid username or avatar path", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn save_profile(
    state: AppState,
    ctx: RequestContext,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = ctx.require_identity()?;
    let request: ProfileRequest = ctx.json().await?;
    let username_changed = request.username.is_some();

    let (user, registered) = match ctx.current_user() {
        Some(existing) => {
            let mut user = existing.clone();
            User::update(&mut user, request.username, request.avatar_path)?;
            (user, false)
        }
        None => (
            User::register(identity.clone(), request.username, request.avatar_path)?,
            true,
        ),
    };

    if username_changed {
        let query = Query::new().filter(USERNAME_FIELD, user.fields.username.as_str());
        let holders = typed::find::<User>(state.store.as_ref(), &query).await?;
        if holders
            .iter()
            .any(|other| other.id() != user.id() && !other.record.is_deleted())
        {
            return Err(GatewayError::AlreadyExists("Username already taken".into()));
        }
    }

    typed::save(state.store.as_ref(), &user).await?;
    if registered {
        tracing::info!(id = %user.id(), username = %user.fields.username, "new user registered");
    } else {
        tracing::info!(id = %user.id(), "profile updated");
    }
    Ok(Json(ProfileView::from(&user)))
}
