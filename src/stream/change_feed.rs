//! Bridges document-store change subscriptions onto the event bus.
//!
//! One adapter is opened per event stream, bound to that stream's cursor.
//! It runs one forwarding task per watched collection; each changed
//! document is classified, sanitized and emitted tagged with the adapter's
//! [`FeedId`]. When a change subscription errors or ends, the task reports
//! it to its stream and stops. Other adapters are unaffected.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;

use super::fanout::Signal;
use crate::domain::{Collection, Document, EventBus, EventKind, FeedId, Post, Stored, User};
use crate::store::{ChangeStream, DocumentStore, StoreError};

/// Collections whose changes are streamed.
pub const WATCHED: [Collection; 2] = [Collection::Posts, Collection::Users];

/// Running change-feed forwarders for one stream.
///
/// Dropping the adapter aborts its tasks.
#[derive(Debug)]
pub struct ChangeFeedAdapter {
    feed: FeedId,
    tasks: Vec<JoinHandle<()>>,
}

impl ChangeFeedAdapter {
    /// Opens a change subscription for every watched collection, then
    /// starts forwarding.
    ///
    /// Subscriptions are all opened before any task starts, so a failure
    /// leaves nothing running.
    ///
    /// # Errors
    ///
    /// Returns the store error if any change subscription cannot be opened.
    pub async fn open(
        store: &dyn DocumentStore,
        bus: &EventBus,
        feed: FeedId,
        since: DateTime<Utc>,
        failures: WeakUnboundedSender<Signal>,
    ) -> Result<Self, StoreError> {
        let mut feeds = Vec::with_capacity(WATCHED.len());
        for collection in WATCHED {
            feeds.push((collection, store.subscribe_changes(collection, since).await?));
        }

        let tasks = feeds
            .into_iter()
            .map(|(collection, changes)| {
                tokio::spawn(forward(
                    collection,
                    changes,
                    bus.clone(),
                    feed,
                    failures.clone(),
                ))
            })
            .collect();

        tracing::debug!(%feed, %since, "change feed adapter started");
        Ok(Self { feed, tasks })
    }

    /// Identity stamped on every event this adapter emits.
    #[must_use]
    pub const fn feed(&self) -> FeedId {
        self.feed
    }
}

impl Drop for ChangeFeedAdapter {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn forward(
    collection: Collection,
    mut changes: ChangeStream,
    bus: EventBus,
    feed: FeedId,
    failures: WeakUnboundedSender<Signal>,
) {
    let reason = loop {
        match changes.next().await {
            Some(Ok(document)) => {
                let id = document.id();
                match classify(collection, document) {
                    Ok(Some((kind, payload))) => {
                        bus.emit_from(feed, kind, payload);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(%feed, %collection, %id, error = %e, "skipping undecodable document");
                    }
                }
            }
            Some(Err(e)) => break format!("{collection} change feed failed: {e}"),
            None => break format!("{collection} change feed ended"),
        }
    };

    tracing::error!(%feed, %collection, %reason, "change feed adapter stopped");
    if let Some(stream) = failures.upgrade() {
        // The stream may already be closing.
        let _ = stream.send(Signal::FeedFailed(reason));
    }
}

/// Event kind and sanitized payload for a changed document, or `None` if
/// the collection is not streamed.
///
/// # Errors
///
/// Returns an error if the document's fields do not decode as the
/// collection's entity.
pub fn classify(
    collection: Collection,
    document: Document,
) -> Result<Option<(EventKind, Value)>, serde_json::Error> {
    let Some(kind) = EventKind::for_change(collection, document.record.change_kind()) else {
        return Ok(None);
    };
    let payload = match collection {
        Collection::Posts => {
            serde_json::to_value(Post::view(&Stored::<Post>::from_document(document)?))?
        }
        Collection::Users => {
            serde_json::to_value(User::public_view(&Stored::<User>::from_document(document)?))?
        }
        Collection::Rooms => return Ok(None),
    };
    Ok(Some((kind, payload)))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{DeliveryError, DomainEvent, PhoneNumber, Subscription};
    use crate::store::{MemoryStore, typed};

    fn user(username: &str) -> Stored<User> {
        let Some(phone) = PhoneNumber::parse("+15550123") else {
            panic!("valid phone");
        };
        let Ok(user) = User::register(phone, Some(username.into()), Some("me.png".into())) else {
            panic!("valid user");
        };
        user
    }

    #[test]
    fn classifies_by_timestamps_and_tombstone() {
        let mut stored = user("trinity");
        let Ok(document) = stored.to_document() else {
            panic!("document");
        };
        let Ok(Some((kind, payload))) = classify(Collection::Users, document) else {
            panic!("classified");
        };
        assert_eq!(kind, EventKind::UserCreated);
        assert!(payload.get("phoneNumber").is_none());
        assert_eq!(payload.get("username"), Some(&Value::from("trinity")));

        let actor = stored.id();
        stored.record.delete(actor);
        let Ok(document) = stored.to_document() else {
            panic!("document");
        };
        let Ok(Some((kind, payload))) = classify(Collection::Users, document) else {
            panic!("classified");
        };
        assert_eq!(kind, EventKind::UserDeleted);
        assert!(payload.get("username").is_none());
        assert!(payload.get("deletedAt").is_some());
    }

    #[test]
    fn undecodable_document_is_an_error() {
        let Ok(document) = user("morpheus").to_document() else {
            panic!("document");
        };
        assert!(classify(Collection::Posts, document).is_err());
    }

    fn collect(bus: &EventBus, kind: EventKind) -> (Arc<Mutex<Vec<DomainEvent>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bus.subscribe(
            kind,
            Arc::new(move |event: &DomainEvent| {
                sink.lock()
                    .map_err(|e| DeliveryError::Other(e.to_string()))?
                    .push(event.clone());
                Ok(())
            }),
        );
        (seen, subscription)
    }

    #[tokio::test]
    async fn forwards_changes_tagged_with_feed() {
        let store = MemoryStore::default();
        let bus = EventBus::new();
        let (seen, _subscription) = collect(&bus, EventKind::UserCreated);
        let (tx, _rx) = mpsc::unbounded_channel();
        let feed = FeedId::new();

        let Ok(adapter) =
            ChangeFeedAdapter::open(&store, &bus, feed, DateTime::<Utc>::UNIX_EPOCH, tx.downgrade()).await
        else {
            panic!("adapter should open");
        };
        assert_eq!(adapter.feed(), feed);

        let Ok(()) = typed::save(&store, &user("neo")).await else {
            panic!("save");
        };
        for _ in 0..50 {
            if seen.lock().map(|s| !s.is_empty()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let Ok(seen) = seen.lock() else {
            panic!("lock");
        };
        assert_eq!(seen.len(), 1);
        assert_eq!(seen.first().and_then(|e| e.origin), Some(feed));
        drop(adapter);
    }

    #[tokio::test]
    async fn dropping_the_adapter_stops_forwarding() {
        let store = MemoryStore::default();
        let bus = EventBus::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let Ok(adapter) = ChangeFeedAdapter::open(
            &store,
            &bus,
            FeedId::new(),
            DateTime::<Utc>::UNIX_EPOCH,
            tx.downgrade(),
        )
        .await
        else {
            panic!("adapter should open");
        };
        assert!(!adapter.tasks.iter().any(JoinHandle::is_finished));
        let (seen, _subscription) = collect(&bus, EventKind::UserCreated);
        drop(adapter);
        let Ok(()) = typed::save(&store, &user("cypher")).await else {
            panic!("save");
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(seen.lock().map(|s| s.is_empty()).unwrap_or(false));
    }
}
