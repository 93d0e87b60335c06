//! User profiles.
//!
//! A user is keyed internally by [`RecordId`] and externally by the
//! verified [`PhoneNumber`]. The phone number never leaves the server
//! except in the owner's own profile view.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{Entity, Record, RecordView, Stored, View};
use super::validate::require_name;
use super::{Collection, PhoneNumber, RecordId};
use crate::error::GatewayError;

/// User fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Storage path of the avatar image.
    pub avatar_path: String,
    /// Identity the user registered with.
    pub phone_number: PhoneNumber,
    /// Unique display handle.
    pub username: String,
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;
    const NAME: &'static str = "User";
}

/// Name of the field users are looked up by identity on.
pub const PHONE_NUMBER_FIELD: &str = "phoneNumber";

/// Name of the username field.
pub const USERNAME_FIELD: &str = "username";

impl User {
    /// Registers a new user for `phone_number`.
    ///
    /// The user is its own creator.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if the avatar path is
    /// missing or the username is malformed.
    pub fn register(
        phone_number: PhoneNumber,
        username: Option<String>,
        avatar_path: Option<String>,
    ) -> Result<Stored<Self>, GatewayError> {
        let avatar_path = avatar_path
            .ok_or_else(|| GatewayError::InvalidArgument("Invalid avatarPath field".into()))?;
        let username = require_name(username, "Invalid username format")?;
        let id = RecordId::new();
        Ok(Stored {
            record: Record::with_id(id, id),
            fields: Self {
                avatar_path,
                phone_number,
                username,
            },
        })
    }

    /// Applies a profile update. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if a new username is
    /// malformed.
    pub fn update(
        stored: &mut Stored<Self>,
        username: Option<String>,
        avatar_path: Option<String>,
    ) -> Result<(), GatewayError> {
        if username.is_some() {
            stored.fields.username = require_name(username, "Invalid username format")?;
        }
        if let Some(path) = avatar_path {
            stored.fields.avatar_path = path;
        }
        let actor = stored.id();
        stored.record.touch(actor);
        Ok(())
    }

    /// Public view: everything except the phone number.
    #[must_use]
    pub fn public_view(stored: &Stored<Self>) -> View<UserView> {
        stored.view_with(UserView::from_stored)
    }
}

/// User as other users see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// Record bookkeeping.
    #[serde(flatten)]
    pub record: RecordView,
    /// Avatar image path.
    pub avatar_path: String,
    /// Display handle.
    pub username: String,
}

impl UserView {
    fn from_stored(stored: &Stored<User>) -> Self {
        Self {
            record: stored.record.view(),
            avatar_path: stored.fields.avatar_path.clone(),
            username: stored.fields.username.clone(),
        }
    }
}

/// The caller's own user, including the phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// Public part.
    #[serde(flatten)]
    pub user: UserView,
    /// Verified phone number.
    #[schema(value_type = String)]
    pub phone_number: PhoneNumber,
}

impl From<&Stored<User>> for ProfileView {
    fn from(stored: &Stored<User>) -> Self {
        Self {
            user: UserView::from_stored(stored),
            phone_number: stored.fields.phone_number.clone(),
        }
    }
}
