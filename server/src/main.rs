//! Storefront Insights server binary.
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin storefront-insights
//! ```

use storefront_insights::{app, telemetry, Config};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();
    info!("Starting Storefront Insights");

    let config = Config::from_env();
    info!(
        redpanda = %config.redpanda.brokers,
        topics = ?config.topics(),
        timezone = %config.analytics.timezone,
        consumer_enabled = config.consumer_enabled,
        "Configuration loaded"
    );

    if config.server.metrics_enabled {
        telemetry::install_metrics(config.metrics_address()?)?;
    }

    let application = app::build(config).await?;
    info!(address = ?application.local_addr().ok(), "Application initialized");

    application.run().await?;
    Ok(())
}
