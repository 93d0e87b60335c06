//! Profile request body.

use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for `POST /profile`.
///
/// Registration requires both fields; an update changes whichever is sent.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    /// Unique display handle.
    #[serde(default)]
    pub username: Option<String>,
    /// Avatar image path.
    #[serde(default)]
    pub avatar_path: Option<String>,
}
