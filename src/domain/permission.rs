//! Per-room moderation permissions.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RecordId;

/// What a permission allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    /// Ban members from the room.
    Ban,
    /// Censor posts in the room.
    Censor,
    /// Edit the room itself.
    Edit,
}

/// A grant of one [`PermissionType`] to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Grant id.
    pub id: RecordId,
    /// Granted capability.
    #[serde(rename = "type")]
    pub kind: PermissionType,
    /// Grantee.
    pub user_id: RecordId,
}

impl Permission {
    /// Fresh grant of `kind` to `user_id`.
    #[must_use]
    pub fn new(user_id: RecordId, kind: PermissionType) -> Self {
        Self {
            id: RecordId::new(),
            kind,
            user_id,
        }
    }

    /// The grants a room creator starts with: ban, censor and edit.
    #[must_use]
    pub fn initial_grants(user_id: RecordId) -> Vec<Self> {
        [
            PermissionType::Ban,
            PermissionType::Censor,
            PermissionType::Edit,
        ]
        .into_iter()
        .map(|kind| Self::new(user_id, kind))
        .collect()
    }

    /// Client view; the grantee is not exposed.
    #[must_use]
    pub const fn view(&self) -> PermissionView {
        PermissionView {
            id: self.id,
            kind: self.kind,
        }
    }
}

/// Whether `grants` give `user_id` the `kind` capability.
#[must_use]
pub fn has_permission(grants: &[Permission], user_id: RecordId, kind: PermissionType) -> bool {
    grants
        .iter()
        .any(|grant| grant.user_id == user_id && grant.kind == kind)
}

/// Permission as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionView {
    /// Grant id.
    pub id: RecordId,
    /// Granted capability.
    #[serde(rename = "type")]
    pub kind: PermissionType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_gets_every_grant() {
        let user = RecordId::new();
        let grants = Permission::initial_grants(user);
        assert_eq!(grants.len(), 3);
        for kind in [
            PermissionType::Ban,
            PermissionType::Censor,
            PermissionType::Edit,
        ] {
            assert!(has_permission(&grants, user, kind));
        }
        assert!(!has_permission(&grants, RecordId::new(), PermissionType::Edit));
    }

    #[test]
    fn serializes_type_field() {
        let grant = Permission::new(RecordId::new(), PermissionType::Censor);
        let json = serde_json::to_value(&grant).ok();
        assert_eq!(
            json.as_ref().and_then(|v| v.get("type")),
            Some(&serde_json::Value::from("censor"))
        );
        assert!(json.as_ref().and_then(|v| v.get("userId")).is_some());
    }
}
