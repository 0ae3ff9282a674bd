//! Readiness of the service's dependencies.

use futures::future::BoxFuture;
use std::sync::Arc;
use storefront_insights_postgres::PostgresEventStore;
use storefront_insights_web::{HealthCheck, ReadinessProbe};

/// Reports the event database as unhealthy when it does not answer a ping.
pub struct DatabaseProbe {
    store: Arc<PostgresEventStore>,
}

impl DatabaseProbe {
    /// Probe over `store`'s pool.
    #[must_use]
    pub const fn new(store: Arc<PostgresEventStore>) -> Self {
        Self { store }
    }
}

impl ReadinessProbe for DatabaseProbe {
    fn check(&self) -> BoxFuture<'_, Vec<HealthCheck>> {
        Box::pin(async move {
            let database = match self.store.ping().await {
                Ok(()) => HealthCheck::healthy("database"),
                Err(e) => HealthCheck::unhealthy("database", e.to_string()),
            };
            vec![database]
        })
    }
}
