//! Wiring of the production application.

use crate::config::Config;
use crate::health::DatabaseProbe;
use crate::routes::build_router;
use crate::runtime::{Application, BehaviorEventDispatcher, EventConsumer};
use crate::state::AppState;
use crate::tracking::EventPublisher;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use storefront_insights_analytics::AnalyticsFacade;
use storefront_insights_core::event_bus::EventBus;
use storefront_insights_postgres::{PostgresCatalog, PostgresEventStore};
use storefront_insights_redpanda::RedpandaEventBus;
use tokio::sync::broadcast;
use tracing::info;

/// Connect to Postgres and Redpanda, bind the listener and assemble the
/// router and the ingestion consumer.
///
/// # Errors
///
/// Fails when the configuration is invalid, a dependency cannot be reached,
/// migrations fail or the address cannot be bound.
pub async fn build(config: Config) -> anyhow::Result<Application> {
    config.validate().context("Invalid configuration")?;

    info!("Connecting to PostgreSQL...");
    let store = Arc::new(
        PostgresEventStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    if config.database.run_migrations {
        store.migrate().await.context("Failed to run migrations")?;
        info!("Migrations applied");
    }
    let catalog = Arc::new(PostgresCatalog::new(store.pool().clone()));

    info!(brokers = %config.redpanda.brokers, "Connecting to Redpanda...");
    let redpanda = &config.redpanda;
    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&redpanda.brokers)
            .producer_acks(&redpanda.acks)
            .compression(&redpanda.compression)
            .timeout(Duration::from_millis(redpanda.timeout_ms))
            .retries(redpanda.retries)
            .retry_backoff(Duration::from_millis(redpanda.retry_backoff_ms))
            .consumer_group(&redpanda.consumer_group)
            .buffer_size(redpanda.buffer_size)
            .auto_offset_reset(&redpanda.auto_offset_reset)
            .build()
            .context("Failed to create Redpanda client")?,
    );

    let publisher = EventPublisher::new(
        Arc::clone(&event_bus),
        redpanda.behavior_topic.clone(),
        redpanda.auth_topic.clone(),
    );
    let analytics = AnalyticsFacade::new(store.clone(), catalog);
    let probe = Arc::new(DatabaseProbe::new(Arc::clone(&store)));
    let state = AppState::new(publisher, analytics, Arc::new(config.analytics.clone()), probe);

    let (shutdown_tx, _) = broadcast::channel(1);
    let consumer = config.consumer_enabled.then(|| {
        let dispatcher = Arc::new(BehaviorEventDispatcher::new(store.clone()));
        EventConsumer::new(
            "behavior-ingest",
            config.topics(),
            Arc::clone(&event_bus),
            dispatcher,
            shutdown_tx.subscribe(),
        )
        .with_retry_delay(Duration::from_secs(redpanda.reconnect_delay))
    });
    if consumer.is_none() {
        info!("Ingestion consumer disabled");
    }

    let address = config.http_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    Ok(Application::new(
        listener,
        build_router(state),
        consumer,
        shutdown_tx,
        config.shutdown_timeout(),
    ))
}
