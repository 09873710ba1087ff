//! Topic abstraction for the broadcast hub.
//!
//! A topic is a named broadcast group; every subscriber receives every
//! envelope published to it. Echo suppression happens on the delivery
//! path by filtering envelopes whose source is the receiving subscriber.

use crate::envelope::Envelope;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Maximum topic name length.
pub const MAX_TOPIC_NAME_LENGTH: usize = 256;

/// Default broadcast capacity per topic.
const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// A topic identifier.
pub type TopicId = String;

/// Validate a topic name.
///
/// # Errors
///
/// Returns an error message if the topic name is invalid.
pub fn validate_topic_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Topic name cannot be empty");
    }
    if name.len() > MAX_TOPIC_NAME_LENGTH {
        return Err("Topic name too long");
    }
    if name.starts_with('$') {
        return Err("Topic names starting with '$' are reserved");
    }
    if !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Topic name contains invalid characters");
    }
    Ok(())
}

/// A named fan-out group for broadcast envelopes.
#[derive(Debug)]
pub struct Topic {
    /// Topic name.
    name: TopicId,
    /// Broadcast sender for this topic.
    sender: broadcast::Sender<Arc<Envelope>>,
    /// Set of subscribed subscriber IDs.
    subscribers: HashSet<String>,
}

impl Topic {
    /// Create a new topic.
    #[must_use]
    pub fn new(name: impl Into<TopicId>) -> Self {
        Self::with_capacity(name, DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a new topic with a specific capacity.
    #[must_use]
    pub fn with_capacity(name: impl Into<TopicId>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            name: name.into(),
            sender,
            subscribers: HashSet::new(),
        }
    }

    /// Get the topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if a subscriber is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains(subscriber_id)
    }

    /// Subscribe to this topic.
    ///
    /// Returns a receiver for envelopes published after this call;
    /// earlier envelopes are never replayed.
    pub fn subscribe(
        &mut self,
        subscriber_id: impl Into<String>,
    ) -> broadcast::Receiver<Arc<Envelope>> {
        let sub_id = subscriber_id.into();
        self.subscribers.insert(sub_id.clone());
        debug!(topic = %self.name, subscriber = %sub_id, "Subscriber joined topic");
        self.sender.subscribe()
    }

    /// Unsubscribe from this topic.
    ///
    /// Returns `true` if the subscriber was subscribed.
    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        let removed = self.subscribers.remove(subscriber_id);
        if removed {
            debug!(topic = %self.name, subscriber = %subscriber_id, "Subscriber left topic");
        }
        removed
    }

    /// Publish an envelope to this topic.
    ///
    /// Fire-and-forget: returns the number of receivers the envelope was
    /// handed to, which is zero when nobody is listening.
    pub fn publish(&self, envelope: Envelope) -> usize {
        trace!(topic = %self.name, envelope = envelope.id, "Publishing envelope");
        self.sender.send(Arc::new(envelope)).unwrap_or_default()
    }

    /// Check if the topic has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flick_protocol::BroadcastEvent;

    #[test]
    fn test_topic_creation() {
        let topic = Topic::new("mouse-movement");
        assert_eq!(topic.name(), "mouse-movement");
        assert_eq!(topic.subscriber_count(), 0);
        assert!(topic.is_empty());
    }

    #[test]
    fn test_topic_subscribe_unsubscribe() {
        let mut topic = Topic::new("switch");

        let _rx = topic.subscribe("conn-1");
        assert_eq!(topic.subscriber_count(), 1);
        assert!(topic.is_subscribed("conn-1"));

        let _rx2 = topic.subscribe("conn-2");
        assert_eq!(topic.subscriber_count(), 2);

        assert!(topic.unsubscribe("conn-1"));
        assert_eq!(topic.subscriber_count(), 1);
        assert!(!topic.is_subscribed("conn-1"));

        // Unsubscribing a subscriber that already left
        assert!(!topic.unsubscribe("conn-1"));
    }

    #[test]
    fn test_topic_name_validation() {
        assert!(validate_topic_name("mouse-movement").is_ok());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name("$system").is_err());

        let long_name = "a".repeat(MAX_TOPIC_NAME_LENGTH + 1);
        assert!(validate_topic_name(&long_name).is_err());
    }

    #[tokio::test]
    async fn test_topic_publish() {
        let mut topic = Topic::new("switch");
        let mut rx = topic.subscribe("conn-1");

        let count = topic.publish(Envelope::new(BroadcastEvent::switch_flipped(true)));
        assert_eq!(count, 1);

        let env = rx.recv().await.unwrap();
        assert_eq!(env.event, BroadcastEvent::switch_flipped(true));
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let topic = Topic::new("switch");
        let count = topic.publish(Envelope::new(BroadcastEvent::switch_flipped(false)));
        assert_eq!(count, 0);
    }
}
