//! Event producer.
//!
//! [`EventPublisher`] validates a tracking envelope and publishes it as one
//! keyless JSON message. Authentication events go to the auth topic, every
//! other kind to the behavior topic. Nothing is buffered locally: a broker
//! failure is returned to the caller.

use std::sync::Arc;
use storefront_insights_core::event::{TrackedEvent, ValidationError};
use storefront_insights_core::event_bus::{BusMessage, EventBus, EventBusError};
use thiserror::Error;

/// Why an event was not enqueued.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// The envelope failed validation and was never sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The queue rejected or could not receive the message.
    #[error("event bus unavailable: {0}")]
    Bus(#[from] EventBusError),
}

/// Publishes tracking events onto the queue. Cheap to clone.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    behavior_topic: String,
    auth_topic: String,
}

impl EventPublisher {
    /// Publisher over `bus` with explicit topic names.
    #[must_use]
    pub fn new(
        bus: Arc<dyn EventBus>,
        behavior_topic: impl Into<String>,
        auth_topic: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            behavior_topic: behavior_topic.into(),
            auth_topic: auth_topic.into(),
        }
    }

    /// Topic an event of this envelope is published to.
    #[must_use]
    pub fn topic_for(&self, event: &TrackedEvent) -> &str {
        if event.event_type.is_auth() {
            &self.auth_topic
        } else {
            &self.behavior_topic
        }
    }

    /// Validate and publish one event, returning the topic it went to.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Invalid`] when validation fails and
    /// [`PublishError::Bus`] when the broker does not accept the message.
    pub async fn publish(&self, event: &TrackedEvent) -> Result<&str, PublishError> {
        event.validate()?;

        let topic = self.topic_for(event);
        let message = BusMessage::json(event)?;

        match self.bus.publish(topic, &message).await {
            Ok(()) => {
                metrics::counter!("tracking.published", "topic" => topic.to_string()).increment(1);
                tracing::debug!(
                    topic,
                    event_type = %event.event_type,
                    session_id = %event.session_id,
                    "Event queued"
                );
                Ok(topic)
            },
            Err(error) => {
                metrics::counter!("tracking.publish_failed", "topic" => topic.to_string()).increment(1);
                tracing::error!(topic, event_type = %event.event_type, error = %error, "Failed to queue event");
                Err(error.into())
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storefront_insights_core::event::EventKind;
    use storefront_insights_core::event_bus::{AUTH_TOPIC, BEHAVIOR_TOPIC};
    use storefront_insights_testing::InMemoryEventBus;

    fn publisher(bus: &InMemoryEventBus) -> EventPublisher {
        EventPublisher::new(Arc::new(bus.clone()), BEHAVIOR_TOPIC, AUTH_TOPIC)
    }

    #[tokio::test]
    async fn test_behavior_events_use_behavior_topic() {
        let bus = InMemoryEventBus::new();

        let publisher = publisher(&bus);
        let topic = publisher
            .publish(&TrackedEvent::new(EventKind::PageView, "s-1"))
            .await
            .unwrap();

        assert_eq!(topic, BEHAVIOR_TOPIC);
        let published = bus.published(BEHAVIOR_TOPIC);
        assert_eq!(published.len(), 1);
        assert!(published[0].key.is_none());
        let body: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(body["eventType"], "page_view");
        assert_eq!(body["sessionId"], "s-1");
    }

    #[tokio::test]
    async fn test_auth_events_use_auth_topic() {
        let bus = InMemoryEventBus::new();
        let mut event = TrackedEvent::new(EventKind::UserLogout, "s-1");
        event.customer_id = Some(7);

        publisher(&bus).publish(&event).await.unwrap();

        assert_eq!(bus.published(AUTH_TOPIC).len(), 1);
        assert!(bus.published(BEHAVIOR_TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_event_is_not_sent() {
        let bus = InMemoryEventBus::new();

        let error = publisher(&bus)
            .publish(&TrackedEvent::new(EventKind::Search, " "))
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::Invalid(ValidationError::MissingField("sessionId"))));
        assert_eq!(bus.published_count(), 0);
    }

    #[tokio::test]
    async fn test_broker_failure_surfaces() {
        let bus = InMemoryEventBus::new();
        bus.fail_publishes(true);

        let error = publisher(&bus)
            .publish(&TrackedEvent::new(EventKind::PageView, "s-1"))
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::Bus(EventBusError::PublishFailed { .. })));
    }
}
