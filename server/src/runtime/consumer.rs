//! Event bus consumer with automatic reconnection.
//!
//! ```text
//! loop {
//!     subscribe(topics)
//!         for each message: handler.handle(bytes).await   // sequential
//!     stream lost or subscribe failed: sleep(retry_delay)
//! } until shutdown
//! ```
//!
//! Each message is fully handled before the next one is pulled, so the
//! rows of one partition are written in receipt order. Handler errors are
//! logged and the loop moves on; the message is not retried.

use super::handlers::EventHandler;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use storefront_insights_core::event_bus::{EventBus, EventStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default pause before resubscribing.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Subscribes to a set of topics and feeds every message to one handler.
pub struct EventConsumer {
    /// Consumer name (for logging)
    name: String,

    /// Topics to subscribe to
    topics: Vec<String>,

    /// Event bus to consume from
    event_bus: Arc<dyn EventBus>,

    /// Handler for processing messages
    handler: Arc<dyn EventHandler>,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,

    /// Retry delay after a lost stream or failed subscription
    retry_delay: Duration,
}

impl EventConsumer {
    /// Create a consumer with the default retry delay.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Set a custom retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, topics = ?self.topics, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let subscribed = tokio::select! {
                _ = self.shutdown.recv() => break,
                result = self.event_bus.subscribe(&topics) => result,
            };

            match subscribed {
                Ok(stream) => {
                    info!(consumer = %self.name, "Subscribed to event bus");
                    if self.process_stream(stream).await {
                        break;
                    }
                    warn!(
                        consumer = %self.name,
                        retry_in = ?self.retry_delay,
                        "Event stream ended, reconnecting"
                    );
                },
                Err(e) => {
                    error!(
                        consumer = %self.name,
                        error = %e,
                        retry_in = ?self.retry_delay,
                        "Failed to subscribe to event bus"
                    );
                },
            }

            tokio::select! {
                _ = self.shutdown.recv() => break,
                () = tokio::time::sleep(self.retry_delay) => {},
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Drain `stream` until it ends. Returns `true` when shutdown was signalled.
    async fn process_stream(&mut self, mut stream: EventStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Shutdown signal received during processing");
                    return true;
                }
                next = stream.next() => match next {
                    Some(Ok(message)) => {
                        if let Err(e) = self.handler.handle(&message.payload).await {
                            error!(consumer = %self.name, error = %e, "Failed to handle event");
                        }
                    },
                    Some(Err(e)) => {
                        error!(consumer = %self.name, error = %e, "Error receiving event from stream");
                    },
                    None => return false,
                },
            }
        }
    }
}
