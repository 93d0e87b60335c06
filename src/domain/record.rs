//! Record metadata shared by every stored entity.
//!
//! A [`Stored<T>`] pairs the [`Record`] bookkeeping (id, created/updated/
//! deleted stamps) with entity-specific fields `T`. The untyped form,
//! [`Document`], is what the document store persists and what change
//! feeds carry.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RecordId;
use super::event::ChangeKind;

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// User profiles.
    Users,
    /// Chat rooms.
    Rooms,
    /// Posts inside rooms.
    Posts,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Self; 3] = [Self::Users, Self::Rooms, Self::Posts];

    /// Storage name of the collection.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Rooms => "rooms",
            Self::Posts => "posts",
        }
    }

    /// Looks a collection up by storage name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity field sets that live in a collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the entity is stored in.
    const COLLECTION: Collection;
    /// Human-readable name used in error messages.
    const NAME: &'static str;
}

/// Current time at the storage precision (microseconds).
///
/// PostgreSQL keeps microseconds; truncating up front keeps timestamps
/// equal across a round trip so created/updated comparisons stay exact.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Bookkeeping carried by every stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Record identifier.
    pub id: RecordId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// User that created the record.
    pub created_by: RecordId,
    /// Last modification time. Equal to `created_at` until the first update.
    pub updated_at: DateTime<Utc>,
    /// User that last modified the record.
    pub updated_by: RecordId,
    /// Tombstone time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// User that deleted the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<RecordId>,
}

impl Record {
    /// Fresh record created by `actor`.
    #[must_use]
    pub fn new(actor: RecordId) -> Self {
        Self::with_id(RecordId::new(), actor)
    }

    /// Fresh record with a caller-chosen id.
    #[must_use]
    pub fn with_id(id: RecordId, actor: RecordId) -> Self {
        let at = now();
        Self {
            id,
            created_at: at,
            created_by: actor,
            updated_at: at,
            updated_by: actor,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Stamps a modification by `actor`.
    ///
    /// `updated_at` strictly increases, so an updated record never reads
    /// as freshly created even when the clock has not moved.
    pub fn touch(&mut self, actor: RecordId) {
        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = now().max(floor);
        self.updated_by = actor;
    }

    /// Marks the record deleted by `actor`.
    pub fn delete(&mut self, actor: RecordId) {
        self.touch(actor);
        self.deleted_at = Some(self.updated_at);
        self.deleted_by = Some(actor);
    }

    /// Whether the tombstone is set.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Classifies the latest change to this record.
    #[must_use]
    pub fn change_kind(&self) -> ChangeKind {
        if self.is_deleted() {
            ChangeKind::Deleted
        } else if self.created_at == self.updated_at {
            ChangeKind::Created
        } else {
            ChangeKind::Updated
        }
    }

    /// Client view of a live record.
    #[must_use]
    pub fn view(&self) -> RecordView {
        RecordView {
            id: self.id,
            created_at: self.created_at.timestamp(),
            created_by: self.created_by,
            updated_at: self.updated_at.timestamp(),
            updated_by: self.updated_by,
        }
    }

    /// Client view of a deleted record.
    #[must_use]
    pub fn deleted_view(&self) -> DeletedView {
        DeletedView {
            id: self.id,
            deleted_at: self.deleted_at.unwrap_or(self.updated_at).timestamp(),
            deleted_by: self.deleted_by,
        }
    }
}

/// A record plus its entity fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    /// Bookkeeping.
    pub record: Record,
    /// Entity-specific fields.
    pub fields: T,
}

/// Untyped stored record, as persisted by the document store.
pub type Document = Stored<serde_json::Map<String, serde_json::Value>>;

impl<T> Stored<T> {
    /// Record id.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.record.id
    }

    /// Renders either the live view built by `live` or the tombstone view.
    pub fn view_with<V>(&self, live: impl FnOnce(&Self) -> V) -> View<V> {
        if self.record.is_deleted() {
            View::Deleted(self.record.deleted_view())
        } else {
            View::Live(live(self))
        }
    }
}

impl<T: Serialize> Stored<T> {
    /// Converts to the untyped form.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` does not serialize to a JSON object.
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(&self.fields)? {
            serde_json::Value::Object(fields) => Ok(Stored {
                record: self.record.clone(),
                fields,
            }),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "entity fields must serialize to an object, got {other}"
            ))),
        }
    }
}

impl<T: DeserializeOwned> Stored<T> {
    /// Decodes the untyped form.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored fields do not match `T`.
    pub fn from_document(document: Document) -> Result<Self, serde_json::Error> {
        let fields = serde_json::from_value(serde_json::Value::Object(document.fields))?;
        Ok(Self {
            record: document.record,
            fields,
        })
    }
}

/// Timestamps as Unix seconds, as clients see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    /// Record id.
    pub id: RecordId,
    /// Creation time (Unix seconds).
    pub created_at: i64,
    /// Creator.
    pub created_by: RecordId,
    /// Last modification time (Unix seconds).
    pub updated_at: i64,
    /// Last modifier.
    pub updated_by: RecordId,
}

/// What remains visible of a deleted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedView {
    /// Record id.
    pub id: RecordId,
    /// Deletion time (Unix seconds).
    pub deleted_at: i64,
    /// User that deleted the record.
    pub deleted_by: Option<RecordId>,
}

/// Live or tombstoned client view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum View<T> {
    /// The record exists.
    Live(T),
    /// The record was deleted.
    Deleted(DeletedView),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        body: String,
    }

    #[test]
    fn new_record_has_matching_timestamps() {
        let actor = RecordId::new();
        let record = Record::new(actor);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.created_by, actor);
        assert_eq!(record.updated_by, actor);
        assert_ne!(record.id, actor);
        assert!((record.created_at - Utc::now()).num_seconds().abs() < 1);
        assert_eq!(record.change_kind(), ChangeKind::Created);
    }

    #[test]
    fn touch_always_moves_updated_at_forward() {
        let actor = RecordId::new();
        let mut record = Record::new(actor);
        let before = record.updated_at;
        record.touch(actor);
        assert!(record.updated_at > before);
        assert_eq!(record.change_kind(), ChangeKind::Updated);
    }

    #[test]
    fn delete_sets_tombstone() {
        let actor = RecordId::new();
        let mut record = Record::new(actor);
        record.delete(actor);
        assert!(record.is_deleted());
        assert_eq!(record.deleted_by, Some(actor));
        assert_eq!(record.change_kind(), ChangeKind::Deleted);
    }

    #[test]
    fn timestamps_are_microsecond_precision() {
        let at = now();
        assert_eq!(at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn view_converts_timestamps_to_seconds() {
        let record = Record::new(RecordId::new());
        let view = record.view();
        assert_eq!(view.created_at, record.created_at.timestamp());
        let Ok(json) = serde_json::to_value(&view) else {
            panic!("serialization failed");
        };
        assert!(json.get("createdAt").is_some_and(serde_json::Value::is_i64));
        assert!(json.get("updatedBy").is_some());
    }

    #[test]
    fn deleted_records_only_expose_tombstone() {
        let actor = RecordId::new();
        let mut stored = Stored {
            record: Record::new(actor),
            fields: Note {
                body: "secret".into(),
            },
        };
        stored.record.delete(actor);
        let view = stored.view_with(|s| s.fields.body.clone());
        let Ok(json) = serde_json::to_value(&view) else {
            panic!("serialization failed");
        };
        let Some(object) = json.as_object() else {
            panic!("expected object");
        };
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["deletedAt", "deletedBy", "id"]);
    }

    #[test]
    fn document_conversion_preserves_fields() {
        let stored = Stored {
            record: Record::new(RecordId::new()),
            fields: Note {
                body: "hello".into(),
            },
        };
        let Ok(document) = stored.to_document() else {
            panic!("to_document failed");
        };
        assert_eq!(
            document.fields.get("body"),
            Some(&serde_json::Value::from("hello"))
        );
        let Ok(back) = Stored::<Note>::from_document(document) else {
            panic!("from_document failed");
        };
        assert_eq!(back, stored);
    }

    #[test]
    fn collection_names() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.as_str()), Some(collection));
        }
        assert_eq!(Collection::from_name("comments"), None);
    }
}
