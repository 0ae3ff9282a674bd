//! Shared harness: the real router over in-memory stores and bus.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use storefront_insights::config::AnalyticsConfig;
use storefront_insights::{build_router, AppState, EventPublisher};
use storefront_insights_analytics::AnalyticsFacade;
use storefront_insights_core::event_bus::{AUTH_TOPIC, BEHAVIOR_TOPIC};
use storefront_insights_testing::{InMemoryCatalog, InMemoryEventBus, InMemoryEventStore};
use storefront_insights_web::{HealthCheck, ReadinessProbe};
use tower::ServiceExt;

/// Probe answering with fixed checks.
pub struct StaticProbe(pub Vec<HealthCheck>);

impl ReadinessProbe for StaticProbe {
    fn check(&self) -> BoxFuture<'_, Vec<HealthCheck>> {
        Box::pin(async move { self.0.clone() })
    }
}

pub struct TestApp {
    pub router: Router,
    pub bus: InMemoryEventBus,
    pub store: InMemoryEventStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_catalog(InMemoryCatalog::new())
    }

    pub fn with_catalog(catalog: InMemoryCatalog) -> Self {
        Self::with_parts(
            InMemoryEventStore::new(),
            catalog,
            vec![HealthCheck::healthy("database")],
        )
    }

    pub fn with_parts(
        store: InMemoryEventStore,
        catalog: InMemoryCatalog,
        checks: Vec<HealthCheck>,
    ) -> Self {
        let bus = InMemoryEventBus::new();
        let publisher = EventPublisher::new(Arc::new(bus.clone()), BEHAVIOR_TOPIC, AUTH_TOPIC);
        let analytics = AnalyticsFacade::new(Arc::new(store.clone()), Arc::new(catalog));
        let state = AppState::new(
            publisher,
            analytics,
            Arc::new(AnalyticsConfig::default()),
            Arc::new(StaticProbe(checks)),
        );

        Self {
            router: build_router(state),
            bus,
            store,
        }
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_with(uri, body, &[]).await
    }

    pub async fn post_with(
        &self,
        uri: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = request.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Published messages on `topic`, decoded.
    pub fn published_json(&self, topic: &str) -> Vec<Value> {
        self.bus
            .published(topic)
            .iter()
            .map(|message| serde_json::from_slice(&message.payload).unwrap())
            .collect()
    }
}
