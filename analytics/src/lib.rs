//! # Storefront Insights Analytics
//!
//! Read-only report services computed on demand from the behavior event store
//! and the commerce reference tables.
//!
//! - [`SalesAnalytics`]: revenue, best sellers, categories, discount impact
//! - [`OrderAnalytics`]: order status mix and daily order flow
//! - [`InventoryAnalytics`]: stock levels and product movement
//! - [`BehaviorAnalytics`]: visitors, engagement, funnels, cohorts, searches,
//!   devices, pages, journeys, cart abandonment, PC-build and auth activity
//! - [`AnalyticsFacade`]: one entry point delegating to the services above
//!
//! Every report takes a [`ReportWindow`](storefront_insights_core::time::ReportWindow),
//! returns a camelCase-serializable value and fails with a typed
//! [`AnalyticsError`]. Nothing is cached; each call reads the store.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_insights_analytics::AnalyticsFacade;
//! use storefront_insights_core::store::{BehaviorEventReader, CommerceCatalog};
//! use storefront_insights_core::time::ReportWindow;
//! use storefront_insights_core::NaiveDate;
//!
//! # async fn example(
//! #     events: Arc<dyn BehaviorEventReader>,
//! #     catalog: Arc<dyn CommerceCatalog>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let facade = AnalyticsFacade::new(events, catalog);
//! let window = ReportWindow::utc(
//!     NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default(),
//!     NaiveDate::from_ymd_opt(2024, 4, 1).unwrap_or_default(),
//! )?;
//! let summary = facade.sales_summary(window).await?;
//! println!("revenue: {}", summary.total_revenue);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod behavior;
pub mod error;
pub mod facade;
pub mod inventory;
pub mod orders;
pub mod sales;
pub mod text;

mod tally;

pub use behavior::BehaviorAnalytics;
pub use error::AnalyticsError;
pub use facade::AnalyticsFacade;
pub use inventory::InventoryAnalytics;
pub use orders::OrderAnalytics;
pub use sales::SalesAnalytics;

use serde::Serialize;
use std::future::Future;
use std::time::Instant;

/// Percentages and money are reported with two decimals.
pub(crate) const DECIMALS: u32 = 2;

/// A named count and its share of the total.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    /// Bucket label.
    pub name: String,
    /// Items in the bucket.
    pub count: u64,
    /// `100 * count / total`, two decimals.
    pub percentage: f64,
}

/// Run one report, recording its duration and logging a failure with its name.
pub(crate) async fn observe<T>(
    report: &'static str,
    body: impl Future<Output = Result<T, AnalyticsError>>,
) -> Result<T, AnalyticsError> {
    let started = Instant::now();
    let result = body.await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::histogram!(
        "analytics.report.duration_seconds",
        "report" => report,
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());

    match &result {
        Ok(_) => tracing::debug!(report, elapsed_ms = started.elapsed().as_millis(), "Report computed"),
        Err(error) => tracing::error!(report, error = %error, "Report failed"),
    }
    result
}
