//! Post request bodies.

use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Request body for `POST /posts`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    /// Room to post in (hyphenated UUID).
    #[serde(default)]
    pub room_id: Option<String>,
    /// Section drafts: `{"type":"text","body":…}` or
    /// `{"type":"attachment","path":…}`.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub sections: Option<Vec<Value>>,
}
