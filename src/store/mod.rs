//! Document store: the persistence collaborator behind every handler.
//!
//! [`DocumentStore`] is a small interface over named collections of JSON
//! documents with record metadata. Two backends implement it:
//! [`memory::MemoryStore`] for development and tests, and
//! [`postgres::PostgresStore`] on top of `sqlx`.
//!
//! Besides point reads, writes and simple queries, every backend offers a
//! change subscription: all documents modified at or after a cursor,
//! followed by live modifications for as long as the stream is held.

pub mod memory;
pub mod postgres;
pub mod typed;

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::domain::{Collection, Document, RecordId};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Document store failures. All of them are server errors to clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected or failed an operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored document did not have the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A change subscriber fell behind and missed notifications.
    #[error("change feed lagged by {0} notifications")]
    FeedLagged(u64),

    /// The change notification source went away.
    #[error("change feed closed")]
    FeedClosed,
}

/// Stream of changed documents, oldest first.
pub type ChangeStream = BoxStream<'static, Result<Document, StoreError>>;

/// Result ordering for [`Query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    /// Newest `createdAt` first.
    CreatedDesc,
    /// Largest value of a numeric field first.
    FieldDesc(String),
}

/// Equality filters plus optional bound, ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// `(field, value)` pairs that must all match exactly.
    pub filters: Vec<(String, Value)>,
    /// Only documents created strictly before this instant.
    pub created_before: Option<DateTime<Utc>>,
    /// Result ordering; unspecified when `None`.
    pub order: Option<Order>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Empty query matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter on `field`.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Restricts results to documents created before `at`.
    #[must_use]
    pub const fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `document` satisfies the filters and bound.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.created_before
            .is_none_or(|bound| document.record.created_at < bound)
            && self
                .filters
                .iter()
                .all(|(field, value)| document.fields.get(field) == Some(value))
    }

    /// Sorts `documents` and applies the limit.
    pub fn arrange(&self, documents: &mut Vec<Document>) {
        match &self.order {
            Some(Order::CreatedDesc) => {
                documents.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
            }
            Some(Order::FieldDesc(field)) => {
                let number = |d: &Document| d.fields.get(field).and_then(Value::as_f64);
                documents.sort_by(|a, b| {
                    number(b)
                        .partial_cmp(&number(a))
                        .unwrap_or(Ordering::Equal)
                });
            }
            None => {}
        }
        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }
    }
}

/// Persistence interface consumed by the gateway.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Reads one document. Deleted documents are returned with their
    /// tombstone set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn get(&self, collection: Collection, id: RecordId) -> Result<Option<Document>, StoreError>;

    /// Creates or replaces a document and notifies change subscribers.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError>;

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Opens a change subscription for `collection`: every document whose
    /// `updatedAt` is at or after `since`, then live changes.
    ///
    /// Errors after the stream is open are yielded as items; the stream
    /// ends only when the backend goes away.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the subscription cannot be opened.
    async fn subscribe_changes(
        &self,
        collection: Collection,
        since: DateTime<Utc>,
    ) -> Result<ChangeStream, StoreError>;
}
