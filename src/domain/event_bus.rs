//! In-memory publish/subscribe for domain events.
//!
//! [`EventBus`] keeps a table of `deliver` callbacks keyed by
//! [`EventKind`]. [`EventBus::subscribe`] returns a [`Subscription`]: the
//! only handle on that registration. Dropping or unsubscribing it removes
//! exactly that callback.
//!
//! `emit` snapshots the callbacks for a kind and releases the lock before
//! calling any of them, so a callback may subscribe or unsubscribe without
//! deadlocking. A failing or panicking callback is logged and the remaining
//! subscribers still receive the event.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::event::{DeliveryError, DomainEvent, EventKind, FeedId};

/// Callback invoked once per matching event.
pub type Deliver = Arc<dyn Fn(&DomainEvent) -> Result<(), DeliveryError> + Send + Sync>;

struct Entry {
    id: u64,
    active: AtomicBool,
    deliver: Deliver,
}

#[derive(Default)]
struct Registry {
    table: Mutex<HashMap<EventKind, Vec<Arc<Entry>>>>,
    next_id: AtomicU64,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Arc<Entry>>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, kind: EventKind, id: u64) -> bool {
        let mut table = self.lock();
        let Some(entries) = table.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let entry = entries.swap_remove(pos);
        entry.active.store(false, Ordering::Release);
        if entries.is_empty() {
            table.remove(&kind);
        }
        true
    }
}

/// Process-wide event bus.
///
/// Cheap to clone; clones share one subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.total_subscribers())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `deliver` for `kind`.
    ///
    /// After [`shutdown`](Self::shutdown) the returned subscription is
    /// inert: nothing is registered and `deliver` is dropped immediately.
    pub fn subscribe(&self, kind: EventKind, deliver: Deliver) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut table = self.registry.lock();
            if self.is_closed() {
                tracing::debug!(%kind, "subscribe after shutdown ignored");
                return Subscription {
                    id,
                    kind,
                    registry: Weak::new(),
                };
            }
            table.entry(kind).or_default().push(Arc::new(Entry {
                id,
                active: AtomicBool::new(true),
                deliver,
            }));
        }
        tracing::trace!(%kind, id, "subscribed");
        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers a fresh event to every current subscriber of `kind`.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn emit(&self, kind: EventKind, payload: serde_json::Value) -> usize {
        self.dispatch(kind, payload, None)
    }

    /// Like [`emit`](Self::emit), tagging the event with the feed that
    /// produced it.
    pub fn emit_from(&self, feed: FeedId, kind: EventKind, payload: serde_json::Value) -> usize {
        self.dispatch(kind, payload, Some(feed))
    }

    fn dispatch(&self, kind: EventKind, payload: serde_json::Value, origin: Option<FeedId>) -> usize {
        let snapshot: Vec<Arc<Entry>> = match self.registry.lock().get(&kind) {
            Some(entries) => entries.iter().map(Arc::clone).collect(),
            None => return 0,
        };
        let event = DomainEvent {
            kind,
            payload,
            emitted_at: self.registry.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            origin,
        };

        let mut delivered = 0;
        for entry in snapshot {
            // Unsubscribed after the snapshot was taken.
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (entry.deliver)(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(DeliveryError::Closed)) => {
                    tracing::debug!(%kind, id = entry.id, "subscriber closed");
                }
                Ok(Err(e)) => {
                    tracing::warn!(%kind, id = entry.id, error = %e, "delivery failed");
                }
                Err(_) => {
                    tracing::error!(%kind, id = entry.id, "subscriber panicked during delivery");
                }
            }
        }
        delivered
    }

    /// Number of live subscriptions for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Number of live subscriptions across all kinds.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.registry.lock().values().map(Vec::len).sum()
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.registry.closed.load(Ordering::Acquire)
    }

    /// Releases every subscription and refuses new ones.
    ///
    /// Dropping the callbacks drops whatever they captured, which is how
    /// open streams learn that the bus is gone.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<Entry>> = {
            let mut table = self.registry.lock();
            self.registry.closed.store(true, Ordering::Release);
            table.drain().flat_map(|(_, entries)| entries).collect()
        };
        for entry in &drained {
            entry.active.store(false, Ordering::Release);
        }
        tracing::info!(released = drained.len(), "event bus shut down");
    }
}

/// Capability to remove one registration from an [`EventBus`].
///
/// Holds only a weak reference to the bus. Unsubscribing twice, or after
/// the bus is gone, is a no-op. Dropping the subscription unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Registry>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("live", &self.is_live())
            .finish()
    }
}

impl Subscription {
    /// Whether the registration is still in the bus.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .lock()
                .get(&self.kind)
                .is_some_and(|entries| entries.iter().any(|e| e.id == self.id))
        })
    }

    /// Removes the registration.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        self.registry = Weak::new();
        let removed = registry.remove(self.kind, self.id);
        if removed {
            tracing::trace!(kind = %self.kind, id = self.id, "unsubscribed");
        }
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
