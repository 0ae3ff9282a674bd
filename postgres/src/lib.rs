//! `PostgreSQL` persistence for Storefront Insights.
//!
//! - [`PostgresEventStore`]: the `behavior_events` table (writer and reader) and
//!   the `viewed_products` side table
//! - [`PostgresCatalog`]: read-only access to `products`, `orders`,
//!   `order_items` and `customers`
//!
//! Both share one `PgPool`. Every window predicate is
//! `created_at >= $from AND created_at < $to`. Money and quantity columns are
//! selected as text and coerced, so a driver's decimal encoding never leaks
//! `NaN` into a report.
//!
//! # Example
//!
//! ```no_run
//! use storefront_insights_postgres::{PostgresCatalog, PostgresEventStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresEventStore::connect("postgres://localhost/storefront", 10).await?;
//! store.migrate().await?;
//! let catalog = PostgresCatalog::new(store.pool().clone());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod events;

pub use catalog::PostgresCatalog;
pub use events::PostgresEventStore;

use storefront_insights_core::store::StoreError;

fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Database(format!("{context}: {e}"))
}
