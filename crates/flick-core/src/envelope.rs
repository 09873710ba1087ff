//! Envelopes carried through the broadcast hub.
//!
//! An envelope wraps a decoded [`BroadcastEvent`] with routing metadata:
//! the originating subscriber (for echo suppression) and a unique id.

use flick_protocol::BroadcastEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique envelope identifier.
pub type EnvelopeId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique envelope ID.
#[must_use]
pub fn generate_envelope_id() -> EnvelopeId {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

/// A broadcast event in flight through the hub.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Unique envelope identifier.
    pub id: EnvelopeId,
    /// Subscriber id of the publisher, if any. Deliveries back to this
    /// subscriber are suppressed so a sender never hears its own echo.
    pub source: Option<String>,
    /// The decoded event.
    pub event: BroadcastEvent,
    /// Milliseconds since the Unix epoch when the envelope was created.
    pub timestamp: u64,
}

impl Envelope {
    /// Create a new envelope.
    #[must_use]
    pub fn new(event: BroadcastEvent) -> Self {
        Self {
            id: generate_envelope_id(),
            source: None,
            event,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }

    /// Attach the publishing subscriber's id.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The topic this envelope routes to.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        self.event.topic()
    }

    /// Whether this envelope originated from the given subscriber.
    #[must_use]
    pub fn is_from(&self, subscriber_id: &str) -> bool {
        self.source.as_deref() == Some(subscriber_id)
    }
}
