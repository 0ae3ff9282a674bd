//! Health check endpoints.
//!
//! `GET /health` answers as long as the process serves HTTP. `GET /ready`
//! asks a [`ReadinessProbe`] about downstream dependencies (database, queue)
//! and answers 503 when any of them is unhealthy.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;

/// Health check status levels, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capacity.
    Degraded,
    /// Not operational.
    Unhealthy,
}

impl HealthStatus {
    /// The worse of two statuses.
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            _ => Self::Healthy,
        }
    }
}

/// Health of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    /// Dependency name.
    pub component: String,
    /// Its status.
    pub status: HealthStatus,
    /// Details, usually the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    /// A healthy component.
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    /// A degraded component.
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    /// An unhealthy component.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// Aggregated readiness.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status of all checks.
    pub status: HealthStatus,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Aggregate `checks`; no checks means healthy.
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, HealthStatus::worst);

        Self {
            status,
            checks,
            timestamp: Utc::now(),
        }
    }
}

/// Reports the health of the dependencies a service needs to do useful work.
pub trait ReadinessProbe: Send + Sync {
    /// Check every dependency.
    fn check(&self) -> BoxFuture<'_, Vec<HealthCheck>>;
}

/// Liveness endpoint.
///
/// ```text
/// GET /health  →  200 {"status":"ok"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Readiness endpoint.
///
/// 200 when healthy or degraded, 503 when any dependency is unhealthy.
pub async fn readiness_check(
    State(probe): State<Arc<dyn ReadinessProbe>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::new(probe.check().await);

    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => {
            tracing::warn!(checks = ?report.checks, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        },
    };

    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<HealthCheck>);

    impl ReadinessProbe for Fixed {
        fn check(&self) -> BoxFuture<'_, Vec<HealthCheck>> {
            Box::pin(async move { self.0.clone() })
        }
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_when_all_healthy() {
        let probe: Arc<dyn ReadinessProbe> = Arc::new(Fixed(vec![
            HealthCheck::healthy("database"),
            HealthCheck::degraded("queue", "slow"),
        ]));

        let (status, Json(report)) = readiness_check(State(probe)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_not_ready_when_any_unhealthy() {
        let probe: Arc<dyn ReadinessProbe> = Arc::new(Fixed(vec![
            HealthCheck::healthy("queue"),
            HealthCheck::unhealthy("database", "connection refused"),
        ]));

        let (status, Json(report)) = readiness_check(State(probe)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.checks.len(), 2);
    }

    #[test]
    fn test_worst_status() {
        assert_eq!(HealthStatus::Healthy.worst(HealthStatus::Degraded), HealthStatus::Degraded);
        assert_eq!(HealthStatus::Degraded.worst(HealthStatus::Unhealthy), HealthStatus::Unhealthy);
        assert_eq!(HealthReport::new(Vec::new()).status, HealthStatus::Healthy);
    }
}
