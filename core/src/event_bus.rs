//! Queue abstraction between the tracking API and the ingestion consumer.
//!
//! ```text
//! POST /api/tracking/*  ──► EventPublisher ──► EventBus::publish(topic, BusMessage)
//!                                                        │
//!                                           behavior topic / auth topic
//!                                                        │
//! EventConsumer ◄── EventStream ◄── EventBus::subscribe(&[behavior, auth])
//! ```
//!
//! Delivery is at-least-once. The consumer processes messages sequentially,
//! awaiting each database write before pulling the next message.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in the testing crate
//! - `RedpandaEventBus` in the redpanda crate (Kafka-compatible)

use futures::Stream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Default topic for user-behavior events.
pub const BEHAVIOR_TOPIC: &str = "user-behavior-events";

/// Default topic for authentication events.
pub const AUTH_TOPIC: &str = "user-auth-events";

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A message could not be encoded or decoded
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// One queue message: an optional partition key and a JSON body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// Partition key. Tracking events are published without one.
    pub key: Option<String>,
    /// Raw message bytes (UTF-8 JSON).
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// A keyless message with the given bytes.
    #[must_use]
    pub const fn new(payload: Vec<u8>) -> Self {
        Self { key: None, payload }
    }

    /// Serialize `value` as a keyless JSON message.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::DeserializationFailed`] if `value` cannot be encoded.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, EventBusError> {
        serde_json::to_vec(value)
            .map(Self::new)
            .map_err(|e| EventBusError::DeserializationFailed(e.to_string()))
    }

    /// Attach a partition key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Stream of messages from a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<BusMessage, EventBusError>> + Send>>;

/// Publish/subscribe over named topics.
///
/// The trait returns boxed futures instead of using `async fn` so it stays
/// dyn-compatible; the publisher and the consumer both hold an `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish one message to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the broker does not accept the message.
    fn publish(
        &self,
        topic: &str,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of messages.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn json_message_is_keyless() {
        let message = BusMessage::json(&serde_json::json!({ "eventType": "search" })).unwrap();
        assert!(message.key.is_none());
        assert_eq!(message.payload, br#"{"eventType":"search"}"#.to_vec());
    }

    #[test]
    fn with_key_sets_partition_key() {
        let message = BusMessage::new(vec![]).with_key("session-1");
        assert_eq!(message.key.as_deref(), Some("session-1"));
    }

    fn assert_dyn_compatible(_: Option<&dyn EventBus>) {}

    #[test]
    fn event_bus_is_dyn_compatible() {
        assert_dyn_compatible(None);
    }
}
