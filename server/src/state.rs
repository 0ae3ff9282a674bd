//! Application state shared across all HTTP handlers.

use crate::config::AnalyticsConfig;
use crate::tracking::EventPublisher;
use axum::extract::FromRef;
use std::sync::Arc;
use storefront_insights_analytics::AnalyticsFacade;
use storefront_insights_web::ReadinessProbe;

/// Dependencies of the API endpoints. Cloned for each request.
///
/// The stores behind the facade are trait objects, so the same router runs
/// against Postgres in production and in-memory stores in tests.
#[derive(Clone)]
pub struct AppState {
    /// Tracking event producer
    pub publisher: EventPublisher,

    /// Report services
    pub analytics: AnalyticsFacade,

    /// Report defaults and limits
    pub settings: Arc<AnalyticsConfig>,

    /// Dependency health for `/ready`
    pub probe: Arc<dyn ReadinessProbe>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(
        publisher: EventPublisher,
        analytics: AnalyticsFacade,
        settings: Arc<AnalyticsConfig>,
        probe: Arc<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            publisher,
            analytics,
            settings,
            probe,
        }
    }
}

impl FromRef<AppState> for Arc<dyn ReadinessProbe> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.probe)
    }
}
