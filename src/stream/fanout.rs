//! Per-connection event stream.
//!
//! An [`ActiveStream`] owns everything one `/events` connection holds on
//! the bus: a [`Subscription`] per event kind and the
//! [`ChangeFeedAdapter`] bound to the connection's cursor. The bus callbacks
//! push into an unbounded channel drained by [`FanoutStream`], so delivery
//! never waits on the network and frames leave in delivery order.
//!
//! The stream moves through `Opening`, `Streaming` and `Closing`. Closing
//! releases every subscription exactly once and stops the adapter; it runs
//! from whichever comes first: peer disconnect (the response body is
//! dropped), adapter failure, or bus shutdown.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::change_feed::ChangeFeedAdapter;
use super::frame::Frame;
use crate::domain::{
    Deliver, DeliveryError, DomainEvent, EventBus, EventKind, FeedId, PhoneNumber, Subscription,
};
use crate::error::GatewayError;
use crate::store::DocumentStore;

/// Message from the bus or the adapter to one stream.
#[derive(Debug)]
pub enum Signal {
    /// An event to write.
    Event(DomainEvent),
    /// The stream's change feed stopped; the stream must close.
    FeedFailed(String),
}

/// Lifecycle phase of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Subscribing and opening the change feed.
    Opening,
    /// Writing frames.
    Streaming,
    /// Resources released. Terminal.
    Closing,
}

/// Resources held by one connection.
#[derive(Debug)]
pub struct ActiveStream {
    identity: PhoneNumber,
    feed: FeedId,
    phase: Phase,
    subscriptions: Vec<Subscription>,
    adapter: Option<ChangeFeedAdapter>,
}

impl ActiveStream {
    fn opening(identity: PhoneNumber) -> Self {
        Self {
            identity,
            feed: FeedId::new(),
            phase: Phase::Opening,
            subscriptions: Vec::with_capacity(EventKind::ALL.len()),
            adapter: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Feed whose events this stream accepts.
    #[must_use]
    pub const fn feed(&self) -> FeedId {
        self.feed
    }

    /// Releases every subscription and stops the change feed.
    ///
    /// Returns `false` if the stream was already closing.
    pub fn close(&mut self, reason: &str) -> bool {
        if self.phase == Phase::Closing {
            return false;
        }
        self.phase = Phase::Closing;
        let released = self.subscriptions.len();
        for subscription in &mut self.subscriptions {
            subscription.unsubscribe();
        }
        self.subscriptions.clear();
        self.adapter = None;
        tracing::info!(
            identity = %self.identity,
            feed = %self.feed,
            released,
            %reason,
            "event stream unsubscribed"
        );
        true
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.close("client disconnected");
    }
}

/// Opens a stream for `identity` replaying changes since `since`.
///
/// # Errors
///
/// Returns a server error if the change feed cannot be opened. Any
/// subscriptions already taken are released.
pub async fn open(
    bus: &EventBus,
    store: &dyn DocumentStore,
    identity: PhoneNumber,
    since: DateTime<Utc>,
) -> Result<FanoutStream, GatewayError> {
    let mut active = ActiveStream::opening(identity);
    let feed = active.feed;
    let (sender, receiver) = mpsc::unbounded_channel();

    for kind in EventKind::ALL {
        let sender = sender.clone();
        let deliver: Deliver = Arc::new(move |event: &DomainEvent| {
            if !event.visible_to(feed) {
                return Ok(());
            }
            sender
                .send(Signal::Event(event.clone()))
                .map_err(|_| DeliveryError::Closed)
        });
        active.subscriptions.push(bus.subscribe(kind, deliver));
    }

    let adapter = ChangeFeedAdapter::open(store, bus, feed, since, sender.downgrade()).await?;
    active.adapter = Some(adapter);
    // From here on only the bus keeps the channel open.
    drop(sender);

    active.phase = Phase::Streaming;
    tracing::info!(
        identity = %active.identity,
        %feed,
        %since,
        "event stream subscribed"
    );
    Ok(FanoutStream { receiver, active })
}

/// Frames for one connection, in delivery order.
#[derive(Debug)]
pub struct FanoutStream {
    receiver: UnboundedReceiver<Signal>,
    active: ActiveStream,
}

impl FanoutStream {
    /// The connection's resources.
    #[must_use]
    pub const fn active(&self) -> &ActiveStream {
        &self.active
    }

    /// Closes the stream early. Idempotent.
    pub fn close(&mut self, reason: &str) {
        if self.active.close(reason) {
            self.receiver.close();
        }
    }
}

impl Stream for FanoutStream {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let this = self.get_mut();
        if this.active.phase == Phase::Closing {
            return Poll::Ready(None);
        }
        loop {
            match ready!(this.receiver.poll_recv(cx)) {
                Some(Signal::Event(event)) => match Frame::from_event(&event) {
                    Ok(frame) => {
                        tracing::debug!(
                            identity = %this.active.identity,
                            kind = %frame.kind,
                            seq = event.emitted_at,
                            "sending event frame"
                        );
                        return Poll::Ready(Some(frame));
                    }
                    Err(e) => {
                        tracing::warn!(kind = %event.kind, error = %e, "dropping unserializable event");
                    }
                },
                Some(Signal::FeedFailed(reason)) => {
                    this.close(&reason);
                    return Poll::Ready(None);
                }
                None => {
                    this.close("event bus shut down");
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::domain::{Collection, Document, RecordId};
    use crate::store::{ChangeStream, MemoryStore, Query, StoreError};

    fn phone() -> PhoneNumber {
        let Some(phone) = PhoneNumber::parse("+15550999") else {
            panic!("valid phone");
        };
        phone
    }

    async fn opened(bus: &EventBus, store: &MemoryStore) -> FanoutStream {
        let Ok(stream) = open(bus, store, phone(), Utc::now()).await else {
            panic!("stream should open");
        };
        stream
    }

    #[tokio::test]
    async fn frames_follow_emit_order() {
        let bus = EventBus::new();
        let store = MemoryStore::default();
        let mut stream = opened(&bus, &store).await;
        assert_eq!(stream.active().phase(), Phase::Streaming);

        bus.emit(EventKind::PostCreated, json!({"n": 1}));
        bus.emit(EventKind::UserUpdated, json!({"n": 2}));
        bus.emit(EventKind::PostDeleted, json!({"n": 3}));

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let Some(frame) = stream.next().await else {
                panic!("frame expected");
            };
            kinds.push((frame.kind, frame.data));
        }
        assert_eq!(
            kinds,
            [
                (EventKind::PostCreated, r#"{"n":1}"#.to_string()),
                (EventKind::UserUpdated, r#"{"n":2}"#.to_string()),
                (EventKind::PostDeleted, r#"{"n":3}"#.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn idle_stream_waits_for_the_next_emit() {
        let bus = EventBus::new();
        let store = MemoryStore::default();
        let mut task = tokio_test::task::spawn(opened(&bus, &store).await);
        tokio_test::assert_pending!(task.poll_next());

        bus.emit(EventKind::UserCreated, json!({"n": 1}));
        assert!(task.is_woken());
        let Some(frame) = tokio_test::assert_ready!(task.poll_next()) else {
            panic!("frame expected");
        };
        assert_eq!(frame.kind, EventKind::UserCreated);
    }

    #[tokio::test]
    async fn other_feeds_are_filtered_out() {
        let bus = EventBus::new();
        let store = MemoryStore::default();
        let mut stream = opened(&bus, &store).await;

        bus.emit_from(FeedId::new(), EventKind::PostCreated, json!({"foreign": true}));
        bus.emit_from(stream.active().feed(), EventKind::PostCreated, json!({"own": true}));

        let Some(frame) = stream.next().await else {
            panic!("frame expected");
        };
        assert_eq!(frame.data, r#"{"own":true}"#);
    }

    #[tokio::test]
    async fn dropping_releases_every_subscription() {
        let bus = EventBus::new();
        let store = MemoryStore::default();
        let stream = opened(&bus, &store).await;
        assert_eq!(bus.total_subscribers(), EventKind::ALL.len());
        drop(stream);
        assert_eq!(bus.total_subscribers(), 0);
        assert_eq!(bus.emit(EventKind::UserCreated, json!({})), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_the_stream() {
        let bus = EventBus::new();
        let store = MemoryStore::default();
        let mut stream = opened(&bus, &store).await;
        stream.close("test");
        stream.close("test again");
        assert_eq!(stream.active().phase(), Phase::Closing);
        assert_eq!(bus.total_subscribers(), 0);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn bus_shutdown_ends_the_stream() {
        let bus = EventBus::new();
        let store = MemoryStore::default();
        let mut stream = opened(&bus, &store).await;
        bus.shutdown();
        assert!(stream.next().await.is_none());
        assert_eq!(stream.active().phase(), Phase::Closing);
    }

    /// Store whose change feeds fail right after opening.
    #[derive(Debug, Default)]
    struct BrokenFeeds(MemoryStore);

    #[async_trait::async_trait]
    impl DocumentStore for BrokenFeeds {
        async fn get(
            &self,
            collection: Collection,
            id: RecordId,
        ) -> Result<Option<Document>, StoreError> {
            self.0.get(collection, id).await
        }

        async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
            self.0.put(collection, document).await
        }

        async fn query(
            &self,
            collection: Collection,
            query: &Query,
        ) -> Result<Vec<Document>, StoreError> {
            self.0.query(collection, query).await
        }

        async fn subscribe_changes(
            &self,
            _collection: Collection,
            _since: DateTime<Utc>,
        ) -> Result<ChangeStream, StoreError> {
            Ok(futures_util::stream::once(async { Err(StoreError::FeedClosed) }).boxed())
        }
    }

    #[tokio::test]
    async fn feed_failure_closes_only_that_stream() {
        let bus = EventBus::new();
        let broken = BrokenFeeds::default();
        let store = MemoryStore::default();
        let Ok(mut failing) = open(&bus, &broken, phone(), Utc::now()).await else {
            panic!("stream should open");
        };
        let mut healthy = opened(&bus, &store).await;

        assert!(failing.next().await.is_none());
        assert_eq!(failing.active().phase(), Phase::Closing);
        assert_eq!(bus.total_subscribers(), EventKind::ALL.len());

        bus.emit(EventKind::UserCreated, json!({"still": "here"}));
        let Some(frame) = healthy.next().await else {
            panic!("healthy stream should keep receiving");
        };
        assert_eq!(frame.kind, EventKind::UserCreated);
    }
}
