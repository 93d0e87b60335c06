//! Process-local document store.
//!
//! Documents live in a `tokio::sync::RwLock`-guarded map. Each collection
//! has a `tokio::broadcast` channel of written documents; writers publish
//! while still holding the write lock, and subscribers take their snapshot
//! and their receiver under the read lock, so a change subscription sees
//! every write exactly once.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, future, stream};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::{ChangeStream, DocumentStore, Query, StoreError};
use crate::domain::{Collection, Document, RecordId};

/// In-memory [`DocumentStore`].
#[derive(Debug)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(Collection, RecordId), Document>>,
    changes: HashMap<Collection, broadcast::Sender<Document>>,
}

impl MemoryStore {
    /// Creates an empty store buffering up to `capacity` change
    /// notifications per collection for slow subscribers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let changes = Collection::ALL
            .into_iter()
            .map(|collection| (collection, broadcast::channel(capacity.max(1)).0))
            .collect();
        Self {
            documents: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: RecordId) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(&(collection, id)).cloned())
    }

    async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        documents.insert((collection, document.id()), document.clone());
        if let Some(changes) = self.changes.get(&collection) {
            // No receivers is fine: nobody is streaming this collection.
            let _ = changes.send(document);
        }
        Ok(())
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut matched: Vec<Document> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|((c, _), doc)| *c == collection && query.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect();
        query.arrange(&mut matched);
        Ok(matched)
    }

    async fn subscribe_changes(
        &self,
        collection: Collection,
        since: DateTime<Utc>,
    ) -> Result<ChangeStream, StoreError> {
        let Some(changes) = self.changes.get(&collection) else {
            return Err(StoreError::FeedClosed);
        };

        let (receiver, mut backlog) = {
            let documents = self.documents.read().await;
            let receiver = changes.subscribe();
            let backlog: Vec<Document> = documents
                .iter()
                .filter(|((c, _), doc)| *c == collection && doc.record.updated_at >= since)
                .map(|(_, doc)| doc.clone())
                .collect();
            (receiver, backlog)
        };
        backlog.sort_by_key(|doc| doc.record.updated_at);

        let live = BroadcastStream::new(receiver).filter_map(move |item| {
            future::ready(match item {
                Ok(doc) if doc.record.updated_at >= since => Some(Ok(doc)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    Some(Err(StoreError::FeedLagged(missed)))
                }
            })
        });

        Ok(stream::iter(backlog.into_iter().map(Ok)).chain(live).boxed())
    }
}
