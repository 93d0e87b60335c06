//! Domain events delivered to live streams.
//!
//! Each [`DomainEvent`] names one of six [`EventKind`]s and carries the
//! sanitized record payload. Events are immutable value types; the bus
//! hands subscribers a shared reference and they clone what they keep.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::record::Collection;

/// How a stored record last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// `createdAt == updatedAt`.
    Created,
    /// `createdAt != updatedAt`.
    Updated,
    /// Tombstone is set.
    Deleted,
}

/// The closed set of event type names streamed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A post was created.
    PostCreated,
    /// A post was updated.
    PostUpdated,
    /// A post was deleted.
    PostDeleted,
    /// A user registered.
    UserCreated,
    /// A user changed their profile.
    UserUpdated,
    /// A user was deleted.
    UserDeleted,
}

impl EventKind {
    /// Every event kind, in wire-name order.
    pub const ALL: [Self; 6] = [
        Self::PostCreated,
        Self::PostUpdated,
        Self::PostDeleted,
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
    ];

    /// Wire name used in the `event:` line of a frame.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostCreated => "postcreated",
            Self::PostUpdated => "postupdated",
            Self::PostDeleted => "postdeleted",
            Self::UserCreated => "usercreated",
            Self::UserUpdated => "userupdated",
            Self::UserDeleted => "userdeleted",
        }
    }

    /// Event kind for a change in `collection`, if that collection is
    /// streamed at all.
    #[must_use]
    pub const fn for_change(collection: Collection, change: ChangeKind) -> Option<Self> {
        match (collection, change) {
            (Collection::Posts, ChangeKind::Created) => Some(Self::PostCreated),
            (Collection::Posts, ChangeKind::Updated) => Some(Self::PostUpdated),
            (Collection::Posts, ChangeKind::Deleted) => Some(Self::PostDeleted),
            (Collection::Users, ChangeKind::Created) => Some(Self::UserCreated),
            (Collection::Users, ChangeKind::Updated) => Some(Self::UserUpdated),
            (Collection::Users, ChangeKind::Deleted) => Some(Self::UserDeleted),
            (Collection::Rooms, _) => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown event type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type `{0}`")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Identifies the change feed that produced an event.
///
/// Feeds are opened per stream with that stream's cursor, so their replay
/// is meant for one connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedId(uuid::Uuid);

impl FeedId {
    /// Fresh feed identity.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for FeedId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    /// Event type.
    pub kind: EventKind,
    /// Sanitized record, ready for the wire.
    pub payload: serde_json::Value,
    /// Bus-wide logical timestamp; strictly increases per emit.
    pub emitted_at: u64,
    /// Feed that produced the event, `None` for direct emits.
    pub origin: Option<FeedId>,
}

impl DomainEvent {
    /// Whether a stream fed by `feed` should see this event.
    #[must_use]
    pub fn visible_to(&self, feed: FeedId) -> bool {
        self.origin.is_none_or(|origin| origin == feed)
    }
}

/// Failure reported by a subscriber's `deliver` callback.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's receiving side is gone.
    #[error("subscriber closed")]
    Closed,

    /// Any other subscriber-side failure.
    #[error("{0}")]
    Other(String),
}
