//! Logging and Prometheus metrics.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "storefront_insights=info,tower_http=info,sqlx=warn";

/// Errors from telemetry setup.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the global tracing subscriber.
///
/// Honours `RUST_LOG`; falls back to [`DEFAULT_LOG_FILTER`].
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the exporter cannot be built or a
/// recorder is already installed.
pub fn install_metrics(addr: SocketAddr) -> Result<(), TelemetryError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .map_err(|e| TelemetryError::Build(e.to_string()))?
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}

fn register_metrics() {
    // Tracking API
    describe_counter!("tracking.published", "Tracking events published to the queue");
    describe_counter!("tracking.publish_failed", "Tracking events the queue rejected");

    // Ingestion
    describe_counter!("ingest.events.received", "Queue messages received by the consumer");
    describe_counter!("ingest.events.persisted", "Behavior events written to the store");
    describe_counter!("ingest.events.dropped", "Queue messages dropped, by reason");
    describe_counter!("event_store.inserted", "Rows inserted into behavior_events");

    // Reports
    describe_histogram!(
        "analytics.report.duration_seconds",
        "Time taken to compute a report"
    );
}
