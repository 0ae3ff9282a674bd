//! Integration tests for [`RedpandaEventBus`] against a real Kafka broker.
//!
//! These tests use testcontainers and cover:
//! - Publish/subscribe round-trip of tracking JSON
//! - One subscription over the behavior and auth topics
//! - Keyless publishing
//! - Committed offsets surviving a resubscribe
//!
//! # Running These Tests
//!
//! They are `#[ignore]`d because they need Docker and take 15-60 seconds each
//! to bring Kafka up:
//! ```bash
//! cargo test -p storefront-insights-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use storefront_insights_core::event_bus::{AUTH_TOPIC, BEHAVIOR_TOPIC, BusMessage, EventBus};
use storefront_insights_redpanda::RedpandaEventBus;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

const WARMUP: &str = "warmup";

fn tracking(event_type: &str, session_id: &str) -> BusMessage {
    BusMessage::json(&json!({ "eventType": event_type, "sessionId": session_id }))
        .expect("encode tracking message")
}

fn event_type(message: &BusMessage) -> String {
    let value: Value = serde_json::from_slice(&message.payload).expect("JSON payload");
    value["eventType"].as_str().unwrap_or_default().to_string()
}

/// Start a Kafka container and wait until it accepts publishes.
async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;
    (kafka, brokers)
}

async fn wait_for_kafka_ready(brokers: &str) {
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        if let Ok(bus) = RedpandaEventBus::new(brokers) {
            if bus.publish("warmup-topic", &tracking(WARMUP, "-")).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(500)).await;
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

/// Publish a warmup message so the topic is auto-created and its metadata propagates.
async fn ensure_topic_exists(event_bus: &RedpandaEventBus, topic: &str) {
    for attempt in 1..=30 {
        if event_bus.publish(topic, &tracking(WARMUP, "-")).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(3)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(attempt != 30, "Failed to create topic {topic}");
    }
}

/// Pull `count` non-warmup messages or fail after `secs`.
async fn collect(
    stream: &mut storefront_insights_core::event_bus::EventStream,
    count: usize,
    secs: u64,
) -> Vec<BusMessage> {
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(secs), async {
        while received.len() < count {
            if let Some(result) = stream.next().await {
                let message = result.expect("Failed to receive message");
                if event_type(&message) != WARMUP {
                    received.push(message);
                }
            }
        }
    })
    .await
    .expect("Timeout waiting for messages");
    received
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn tracking_message_round_trip() {
    let (_kafka, brokers) = start_kafka().await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");
    ensure_topic_exists(&event_bus, BEHAVIOR_TOPIC).await;

    let mut stream = event_bus
        .subscribe(&[BEHAVIOR_TOPIC])
        .await
        .expect("Failed to subscribe");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let sent = BusMessage::json(&json!({
        "eventType": "search",
        "sessionId": "s-1",
        "eventData": { "query": "rtx 4070", "resultsCount": 12 }
    }))
    .expect("encode");
    event_bus
        .publish(BEHAVIOR_TOPIC, &sent)
        .await
        .expect("Failed to publish");

    let received = collect(&mut stream, 1, 10).await;
    assert_eq!(received[0].payload, sent.payload);
    assert!(received[0].key.is_none(), "tracking messages are keyless");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn one_subscription_covers_behavior_and_auth_topics() {
    let (_kafka, brokers) = start_kafka().await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .consumer_group("storefront-insights-ingest")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");
    ensure_topic_exists(&event_bus, BEHAVIOR_TOPIC).await;
    ensure_topic_exists(&event_bus, AUTH_TOPIC).await;

    let mut stream = event_bus
        .subscribe(&[BEHAVIOR_TOPIC, AUTH_TOPIC])
        .await
        .expect("Failed to subscribe");
    tokio::time::sleep(Duration::from_secs(2)).await;

    event_bus
        .publish(BEHAVIOR_TOPIC, &tracking("product_viewed", "s-1"))
        .await
        .expect("publish behavior");
    event_bus
        .publish(AUTH_TOPIC, &tracking("user_authenticated", "s-1"))
        .await
        .expect("publish auth");

    let received = collect(&mut stream, 2, 10).await;
    let kinds: HashSet<String> = received.iter().map(event_type).collect();
    assert!(kinds.contains("product_viewed"));
    assert!(kinds.contains("user_authenticated"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn committed_offsets_survive_resubscribe() {
    let (_kafka, brokers) = start_kafka().await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .consumer_group("resubscribe-test")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    for session in ["s-1", "s-2"] {
        event_bus
            .publish("resubscribe-test", &tracking("page_view", session))
            .await
            .expect("publish");
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    {
        let mut stream = event_bus
            .subscribe(&["resubscribe-test"])
            .await
            .expect("Failed to subscribe");
        let first = collect(&mut stream, 2, 15).await;
        assert_eq!(first.len(), 2);
    }
    // Let the async commits land before the group rejoins.
    tokio::time::sleep(Duration::from_secs(2)).await;

    event_bus
        .publish("resubscribe-test", &tracking("session_end", "s-3"))
        .await
        .expect("publish");

    let mut stream = event_bus
        .subscribe(&["resubscribe-test"])
        .await
        .expect("Failed to resubscribe");
    let next = collect(&mut stream, 1, 20).await;
    assert_eq!(event_type(&next[0]), "session_end");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn producer_configuration() {
    let (_kafka, brokers) = start_kafka().await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .producer_acks("all")
        .compression("lz4")
        .timeout(Duration::from_secs(10))
        .retries(5)
        .retry_backoff(Duration::from_millis(250))
        .buffer_size(5000)
        .consumer_group("custom-group")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    event_bus
        .publish("config-test", &tracking("page_view", "s-1"))
        .await
        .expect("Failed to publish with custom config");

    assert_eq!(event_bus.brokers(), brokers);
}
