//! Kafka-compatible event bus for Storefront Insights.
//!
//! [`RedpandaEventBus`] implements [`EventBus`] from `storefront-insights-core`
//! on top of rdkafka. It works against Redpanda, Apache Kafka or any other
//! broker speaking the Kafka protocol.
//!
//! # Flow
//!
//! ```text
//! POST /api/tracking/*
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ EventPublisher  │  FutureProducer, no partition key
//! └────────┬────────┘
//!          │
//!    ┌─────┴──────┐
//!    ▼            ▼
//! behavior      auth
//!  topic        topic
//!    └─────┬──────┘
//!          ▼
//! ┌─────────────────┐
//! │  EventConsumer  │  StreamConsumer, one group, manual commits
//! └────────┬────────┘
//!          ▼
//!   behavior_events
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Offsets are committed AFTER the message is handed to the subscriber's channel
//! - If the process crashes before commit, messages are redelivered
//! - Tracking messages carry no key, so the producer's default partitioner
//!   spreads them; there is no ordering guarantee across messages
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use storefront_insights_core::event_bus::{BusMessage, EventBus, BEHAVIOR_TOPIC};
//! use storefront_insights_redpanda::RedpandaEventBus;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::new("localhost:9092")?;
//!
//! let message = BusMessage::json(&serde_json::json!({
//!     "eventType": "page_view",
//!     "sessionId": "session-1",
//! }))?;
//! event_bus.publish(BEHAVIOR_TOPIC, &message).await?;
//!
//! let mut stream = event_bus.subscribe(&[BEHAVIOR_TOPIC]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => println!("Received {} bytes", message.payload.len()),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use storefront_insights_core::event_bus::{BusMessage, EventBus, EventBusError, EventStream};

const DEFAULT_ACKS: &str = "1";
const DEFAULT_COMPRESSION: &str = "none";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);
const DEFAULT_BUFFER_SIZE: usize = 1000;
const DEFAULT_OFFSET_RESET: &str = "latest";

/// Redpanda event bus implementation.
///
/// Holds one `FutureProducer` for the lifetime of the bus and creates a fresh
/// `StreamConsumer` per [`EventBus::subscribe`] call.
///
/// # Example
///
/// ```no_run
/// use storefront_insights_redpanda::RedpandaEventBus;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .compression("lz4")
///     .retries(5)
///     .retry_backoff(Duration::from_millis(250))
///     .consumer_group("storefront-insights-ingest")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    /// Kafka producer for publishing messages
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Producer send timeout
    timeout: Duration,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Message buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a new event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Consumer group used by [`EventBus::subscribe`] for `topics`.
    ///
    /// An explicit group wins; otherwise the name is derived from the sorted
    /// topic list so every instance subscribing to the same topics shares it.
    #[must_use]
    pub fn consumer_group_for(&self, topics: &[String]) -> String {
        self.consumer_group.clone().unwrap_or_else(|| {
            let mut sorted = topics.to_vec();
            sorted.sort();
            format!("storefront-insights-{}", sorted.join("-"))
        })
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    retries: Option<u32>,
    retry_backoff: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses (comma-separated, e.g. `"localhost:9092"`).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: `"0"`, `"1"` or `"all"`.
    ///
    /// Default: `"1"`
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: `"none"`, `"gzip"`, `"snappy"`, `"lz4"`, `"zstd"`.
    ///
    /// Default: `"none"`
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout, which also bounds librdkafka's
    /// `message.timeout.ms`.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how many times the producer retries a failed send.
    ///
    /// Default: 3
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the delay between producer retries.
    ///
    /// Default: 100 ms
    #[must_use]
    pub const fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Set the consumer group ID for subscriptions.
    ///
    /// If not set, the group is derived from the subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set how many messages may sit between the Kafka consumer and the subscriber.
    ///
    /// Zero is raised to one. Default: 1000
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Set where a new consumer group starts reading: `"earliest"`, `"latest"` or `"error"`.
    ///
    /// Default: `"latest"`
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set or
    /// the producer configuration is rejected.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.brokers.ok_or_else(|| {
            EventBusError::ConnectionFailed("Brokers not configured".to_string())
        })?;

        let acks = self.producer_acks.as_deref().unwrap_or(DEFAULT_ACKS);
        let compression = self.compression.as_deref().unwrap_or(DEFAULT_COMPRESSION);
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let retries = self.retries.unwrap_or(DEFAULT_RETRIES);
        let retry_backoff = self.retry_backoff.unwrap_or(DEFAULT_RETRY_BACKOFF);
        let buffer_size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| DEFAULT_OFFSET_RESET.to_string());

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("compression.type", compression)
            .set("message.send.max.retries", retries.to_string())
            .set("retry.backoff.ms", retry_backoff.as_millis().to_string())
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            acks,
            compression,
            retries,
            retry_backoff_ms = retry_backoff.as_millis(),
            buffer_size,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset,
        })
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let message = message.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let mut record = FutureRecord::<str, [u8]>::to(&topic).payload(&message.payload);
            if let Some(key) = message.key.as_deref() {
                record = record.key(key);
            }

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        bytes = message.payload.len(),
                        "Message published"
                    );
                    Ok(())
                },
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        error = %kafka_error,
                        "Failed to publish message"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                },
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let consumer_group_id = self.consumer_group_for(&topics);
        let brokers = self.brokers.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The task owns the consumer; dropping the stream drops `rx` and ends it.
            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(message) => {
                            let result = message.payload().map_or_else(
                                || {
                                    Err(EventBusError::DeserializationFailed(
                                        "Message has no payload".to_string(),
                                    ))
                                },
                                |payload| {
                                    tracing::trace!(
                                        topic = message.topic(),
                                        partition = message.partition(),
                                        offset = message.offset(),
                                        "Received message"
                                    );
                                    Ok(BusMessage {
                                        key: message
                                            .key()
                                            .map(|k| String::from_utf8_lossy(k).into_owned()),
                                        payload: payload.to_vec(),
                                    })
                                },
                            );

                            // Commit only once the subscriber has the message.
                            if tx.send(result).await.is_err() {
                                tracing::debug!("Subscriber dropped, exiting consumer task");
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Failed to commit offset (message may be redelivered)"
                                );
                            }
                        },
                        Err(e) => {
                            let err = EventBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        },
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn buffer_size_is_at_least_one() {
        let builder = RedpandaEventBus::builder().buffer_size(0);
        assert_eq!(builder.buffer_size, Some(1));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn consumer_group_is_derived_from_sorted_topics() {
        // Producer creation does not contact the broker.
        let bus = RedpandaEventBus::new("localhost:9092").unwrap();
        let topics = vec!["user-behavior-events".to_string(), "user-auth-events".to_string()];
        assert_eq!(
            bus.consumer_group_for(&topics),
            "storefront-insights-user-auth-events-user-behavior-events"
        );

        let explicit = RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .consumer_group("ingest")
            .build()
            .unwrap();
        assert_eq!(explicit.consumer_group_for(&topics), "ingest");
    }
}
