//! Broadcast hub: topic management and envelope fan-out.
//!
//! The hub owns all topics and routes published envelopes to their
//! subscribers. Delivery is at-most-once and best-effort: nothing is
//! persisted, lagged receivers skip ahead, and a subscriber only sees
//! envelopes published after it subscribed.

use crate::envelope::Envelope;
use crate::topic::{validate_topic_name, Topic, TopicId};
use dashmap::DashMap;
use flick_protocol::BroadcastEvent;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// Invalid topic name.
    #[error("Invalid topic name: {0}")]
    InvalidTopic(&'static str),

    /// Not subscribed to topic.
    #[error("Not subscribed to topic: {0}")]
    NotSubscribed(String),

    /// Already subscribed to topic.
    #[error("Already subscribed to topic: {0}")]
    AlreadySubscribed(String),

    /// Maximum subscriptions reached.
    #[error("Maximum subscriptions reached")]
    MaxSubscriptionsReached,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum subscriptions per subscriber.
    pub max_subscriptions_per_subscriber: usize,
    /// Broadcast capacity per topic.
    pub topic_capacity: usize,
    /// Whether to drop topics once their last subscriber leaves.
    pub auto_delete_empty_topics: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscriptions_per_subscriber: 16,
            topic_capacity: 1024,
            auto_delete_empty_topics: true,
        }
    }
}

/// The central broadcast hub.
///
/// Topics are created lazily on first subscribe and envelopes published
/// to an unknown topic are dropped, matching the best-effort contract.
pub struct Hub {
    /// Topics indexed by name.
    topics: DashMap<TopicId, Topic>,
    /// Subscriber subscriptions (subscriber_id -> set of topic names).
    subscriptions: DashMap<String, dashmap::DashSet<TopicId>>,
    /// Configuration.
    config: HubConfig,
}

impl Hub {
    /// Create a new hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        info!("Creating hub with config: {:?}", config);
        Self {
            topics: DashMap::new(),
            subscriptions: DashMap::new(),
            config,
        }
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            topic_count: self.topics.len(),
            subscriber_count: self.subscriptions.len(),
            total_subscriptions: self.subscriptions.iter().map(|s| s.len()).sum(),
        }
    }

    /// Subscribe to a topic, creating it if needed.
    ///
    /// Returns a receiver for envelopes on the topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic name is invalid or limits are exceeded.
    pub fn subscribe(
        &self,
        subscriber_id: &str,
        topic_name: &str,
    ) -> Result<broadcast::Receiver<Arc<Envelope>>, HubError> {
        validate_topic_name(topic_name).map_err(HubError::InvalidTopic)?;

        let sub_topics = self
            .subscriptions
            .entry(subscriber_id.to_string())
            .or_default();

        if sub_topics.len() >= self.config.max_subscriptions_per_subscriber {
            return Err(HubError::MaxSubscriptionsReached);
        }

        if sub_topics.contains(topic_name) {
            return Err(HubError::AlreadySubscribed(topic_name.to_string()));
        }

        let mut topic = self
            .topics
            .entry(topic_name.to_string())
            .or_insert_with(|| {
                debug!(topic = %topic_name, "Creating new topic");
                Topic::with_capacity(topic_name, self.config.topic_capacity)
            });

        let receiver = topic.subscribe(subscriber_id);
        sub_topics.insert(topic_name.to_string());

        debug!(
            topic = %topic_name,
            subscriber = %subscriber_id,
            subscribers = topic.subscriber_count(),
            "Subscribed"
        );

        Ok(receiver)
    }

    /// Unsubscribe from a topic.
    ///
    /// # Errors
    ///
    /// Returns an error if not subscribed.
    pub fn unsubscribe(&self, subscriber_id: &str, topic_name: &str) -> Result<(), HubError> {
        if let Some(sub_topics) = self.subscriptions.get(subscriber_id) {
            if sub_topics.remove(topic_name).is_none() {
                return Err(HubError::NotSubscribed(topic_name.to_string()));
            }
        } else {
            return Err(HubError::NotSubscribed(topic_name.to_string()));
        }

        if let Some(mut topic) = self.topics.get_mut(topic_name) {
            topic.unsubscribe(subscriber_id);

            if self.config.auto_delete_empty_topics && topic.is_empty() {
                drop(topic); // Release the lock
                self.topics.remove(topic_name);
                debug!(topic = %topic_name, "Deleted empty topic");
            }
        }

        Ok(())
    }

    /// Unsubscribe a subscriber from all topics.
    pub fn unsubscribe_all(&self, subscriber_id: &str) {
        if let Some((_, topics)) = self.subscriptions.remove(subscriber_id) {
            for topic_name in topics.iter() {
                if let Some(mut topic) = self.topics.get_mut(topic_name.as_str()) {
                    topic.unsubscribe(subscriber_id);

                    if self.config.auto_delete_empty_topics && topic.is_empty() {
                        let name = topic_name.clone();
                        drop(topic);
                        self.topics.remove(&name);
                    }
                }
            }
        }

        debug!(subscriber = %subscriber_id, "Unsubscribed from all topics");
    }

    /// Publish an event, optionally tagged with the sending subscriber.
    ///
    /// The source id is carried on the envelope so the delivery path can
    /// exclude the sender; subscribers receiving from the hub must filter
    /// with [`Envelope::is_from`] to honor `exclude_sender` semantics.
    ///
    /// Returns the number of receivers the envelope reached.
    pub fn publish(&self, event: BroadcastEvent, source: Option<&str>) -> usize {
        let mut envelope = Envelope::new(event);
        if let Some(src) = source {
            envelope = envelope.with_source(src);
        }
        self.publish_envelope(envelope)
    }

    /// Publish a prepared envelope.
    pub fn publish_envelope(&self, envelope: Envelope) -> usize {
        let topic_name = envelope.topic();

        if let Some(topic) = self.topics.get(topic_name) {
            let count = topic.publish(envelope);
            trace!(topic = %topic_name, recipients = count, "Published envelope");
            count
        } else {
            warn!(topic = %topic_name, "Publish to topic with no subscribers");
            0
        }
    }

    /// Check if a topic exists.
    #[must_use]
    pub fn topic_exists(&self, topic_name: &str) -> bool {
        self.topics.contains_key(topic_name)
    }

    /// Get the subscriber count for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic_name: &str) -> usize {
        self.topics
            .get(topic_name)
            .map(|t| t.subscriber_count())
            .unwrap_or(0)
    }

    /// Get the topics a subscriber is subscribed to.
    #[must_use]
    pub fn subscriber_topics(&self, subscriber_id: &str) -> Vec<String> {
        self.subscriptions
            .get(subscriber_id)
            .map(|s| s.iter().map(|t| t.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub statistics.
#[derive(Debug, Clone)]
pub struct HubStats {
    /// Number of live topics.
    pub topic_count: usize,
    /// Number of connected subscribers.
    pub subscriber_count: usize,
    /// Total number of subscriptions.
    pub total_subscriptions: usize,
}
