//! In-memory event bus.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use storefront_insights_core::event_bus::{BusMessage, EventBus, EventBusError, EventStream};
use tokio::sync::mpsc;

type Subscribers = HashMap<String, Vec<mpsc::UnboundedSender<BusMessage>>>;

/// Event bus that delivers synchronously to in-process subscribers and keeps a
/// log of everything published.
///
/// # Example
///
/// ```
/// use storefront_insights_core::event_bus::{BusMessage, EventBus};
/// use storefront_insights_testing::InMemoryEventBus;
///
/// # tokio_test::block_on(async {
/// let bus = InMemoryEventBus::new();
/// bus.publish("user-behavior-events", &BusMessage::new(b"{}".to_vec())).await.unwrap();
/// assert_eq!(bus.published("user-behavior-events").len(), 1);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventBus {
    subscribers: Arc<Mutex<Subscribers>>,
    log: Arc<Mutex<Vec<(String, BusMessage)>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail (broker outage).
    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages published to `topic`, oldest first.
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<BusMessage> {
        let log = self.log.lock().unwrap();
        log.iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Total messages published on any topic.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(topic)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    /// Drop every subscriber, ending their streams.
    pub fn disconnect_all(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let message = message.clone();
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "broker unavailable".to_string(),
                });
            }

            {
                let mut subscribers = self
                    .subscribers
                    .lock()
                    .map_err(|e| EventBusError::TransportError(e.to_string()))?;
                if let Some(senders) = subscribers.get_mut(&topic) {
                    senders.retain(|sender| sender.send(message.clone()).is_ok());
                }
            }

            self.log
                .lock()
                .map_err(|e| EventBusError::TransportError(e.to_string()))?
                .push((topic, message));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            {
                let mut subscribers =
                    self.subscribers
                        .lock()
                        .map_err(|e| EventBusError::SubscriptionFailed {
                            topics: topics.clone(),
                            reason: e.to_string(),
                        })?;
                for topic in &topics {
                    subscribers.entry(topic.clone()).or_default().push(tx.clone());
                }
            }

            let stream = async_stream::stream! {
                while let Some(message) = rx.recv().await {
                    yield Ok(message);
                }
            };
            Ok(stream.boxed())
        })
    }
}
