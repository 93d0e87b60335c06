//! Text frames written to event streams.

use axum::response::sse::Event;

use crate::domain::{DomainEvent, EventKind};

/// One serialized event: `event: <type>\ndata: <json>\n\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event type name.
    pub kind: EventKind,
    /// Single-line JSON payload.
    pub data: String,
}

impl Frame {
    /// Serializes a domain event.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be rendered as JSON.
    pub fn from_event(event: &DomainEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: event.kind,
            data: serde_json::to_string(&event.payload)?,
        })
    }
}

impl From<Frame> for Event {
    fn from(frame: Frame) -> Self {
        Self::default().event(frame.kind.as_str()).data(frame.data)
    }
}
