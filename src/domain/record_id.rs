//! Type-safe record identifier.
//!
//! [`RecordId`] is a newtype wrapper around [`uuid::Uuid`] (v4) shared by
//! users, rooms, posts, post sections and permissions.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Length of the hyphenated UUID form (`8-4-4-4-12`).
const HYPHENATED_LEN: usize = 36;

/// Unique identifier for a stored record.
///
/// Generated once at record creation time and immutable thereafter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Creates a new random `RecordId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `RecordId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Parses the hyphenated textual form only.
    ///
    /// `uuid` also accepts the simple, braced and URN forms; ids in paths
    /// and bodies must be hyphenated.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != HYPHENATED_LEN {
            return None;
        }
        uuid::Uuid::try_parse(raw).ok().map(Self)
    }

    /// Parses a client-supplied id, naming `what` in the error.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if `raw` is not a
    /// hyphenated UUID.
    pub fn parse_argument(raw: &str, what: &str) -> Result<Self, GatewayError> {
        Self::parse(raw).ok_or_else(|| GatewayError::InvalidArgument(format!("Invalid {what} id")))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for RecordId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RecordId> for uuid::Uuid {
    fn from(id: RecordId) -> Self {
        id.0
    }
}
