//! Room request bodies.

use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for `POST /rooms`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Unique room name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description. Defaults to empty.
    #[serde(default)]
    pub description: Option<String>,
    /// Background image path.
    #[serde(default)]
    pub background_path: Option<String>,
}

/// Request body for `PUT /rooms/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    /// New background image path.
    #[serde(default)]
    pub background_path: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
}
