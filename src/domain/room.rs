//! Chat rooms.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::permission::{Permission, PermissionType, PermissionView, has_permission};
use super::record::{Entity, Record, RecordView, Stored, View};
use super::validate::require_name;
use super::{Collection, RecordId};
use crate::error::GatewayError;

/// Name of the unique room-name field.
pub const NAME_FIELD: &str = "name";

/// Name of the member counter field, used for sorting.
pub const MEMBER_COUNT_FIELD: &str = "memberCount";

/// Room fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Storage path of the background image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_path: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Unique room name.
    pub name: String,
    /// Number of members.
    #[serde(default)]
    pub member_count: u64,
    /// Moderation grants.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Entity for Room {
    const COLLECTION: Collection = Collection::Rooms;
    const NAME: &'static str = "Room";
}

impl Room {
    /// Creates a room owned by `creator`, who becomes its first member and
    /// receives every moderation grant.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if the name is missing or
    /// malformed.
    pub fn create(
        creator: RecordId,
        name: Option<String>,
        description: Option<String>,
        background_path: Option<String>,
    ) -> Result<Stored<Self>, GatewayError> {
        let name = require_name(name, "Invalid room name")?;
        Ok(Stored {
            record: Record::new(creator),
            fields: Self {
                background_path,
                description: description.unwrap_or_default(),
                name,
                member_count: 1,
                permissions: Permission::initial_grants(creator),
            },
        })
    }

    /// Applies an edit by `actor`. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PermissionDenied`] unless `actor` holds the
    /// edit grant.
    pub fn edit(
        stored: &mut Stored<Self>,
        actor: RecordId,
        background_path: Option<String>,
        description: Option<String>,
    ) -> Result<(), GatewayError> {
        if !stored.fields.can(actor, PermissionType::Edit) {
            return Err(GatewayError::PermissionDenied("Permission denied".into()));
        }
        if let Some(path) = background_path {
            stored.fields.background_path = Some(path);
        }
        if let Some(description) = description {
            stored.fields.description = description;
        }
        stored.record.touch(actor);
        Ok(())
    }

    /// Whether `user_id` holds `kind` in this room.
    #[must_use]
    pub fn can(&self, user_id: RecordId, kind: PermissionType) -> bool {
        has_permission(&self.permissions, user_id, kind)
    }

    /// Client view.
    #[must_use]
    pub fn view(stored: &Stored<Self>) -> View<RoomView> {
        stored.view_with(|s| RoomView {
            record: s.record.view(),
            background_path: s.fields.background_path.clone(),
            description: s.fields.description.clone(),
            name: s.fields.name.clone(),
            member_count: s.fields.member_count,
            permissions: s.fields.permissions.iter().map(Permission::view).collect(),
        })
    }
}

/// Room as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    /// Record bookkeeping.
    #[serde(flatten)]
    pub record: RecordView,
    /// Background image path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_path: Option<String>,
    /// Description.
    pub description: String,
    /// Name.
    pub name: String,
    /// Number of members.
    pub member_count: u64,
    /// Moderation grants.
    pub permissions: Vec<PermissionView>,
}
