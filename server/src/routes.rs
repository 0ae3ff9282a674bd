//! Router configuration.
//!
//! Builds the complete Axum router with all endpoints.

use crate::api::{reports, tracking};
use crate::state::AppState;
use axum::http::{Method, Uri};
use axum::routing::{get, post};
use axum::Router;
use storefront_insights_web::{correlation_id_layer, health_check, readiness_check, AppError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// JSON 404 for paths no route matches.
async fn route_not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Route {}", uri.path()))
}

/// Build the complete Axum router.
///
/// - `/health`, `/ready`: liveness and readiness
/// - `/api/tracking/*`: event intake, answered 202 once queued
/// - `/api/analytics/*`: reports
pub fn build_router(state: AppState) -> Router {
    let tracking_routes = Router::new()
        .route("/events", post(tracking::track_event))
        .route("/product-click", post(tracking::product_click))
        .route("/discount-usage", post(tracking::discount_usage))
        .route("/auth", post(tracking::auth_event));

    let analytics_routes = Router::new()
        // Sales
        .route("/sales/summary", get(reports::sales_summary))
        .route("/sales/daily", get(reports::daily_revenue))
        .route("/sales/best-sellers", get(reports::best_sellers))
        .route("/sales/categories", get(reports::revenue_by_category))
        .route("/sales/discounts", get(reports::discount_impact))
        // Orders
        .route("/orders/summary", get(reports::order_summary))
        .route("/orders/status", get(reports::order_status_breakdown))
        .route("/orders/daily", get(reports::daily_orders))
        // Inventory
        .route("/inventory/stock", get(reports::stock_overview))
        .route("/inventory/movement", get(reports::inventory_movement))
        // Behavior
        .route("/behavior/visitors", get(reports::visitor_overview))
        .route("/behavior/engagement", get(reports::engagement))
        .route("/behavior/funnel", get(reports::funnel))
        .route("/behavior/cohorts", get(reports::cohorts))
        .route("/behavior/products", get(reports::most_viewed_products))
        .route("/behavior/cart-abandonment", get(reports::cart_abandonment))
        .route("/behavior/search", get(reports::search_insights))
        .route("/behavior/devices", get(reports::device_breakdown))
        .route("/behavior/pages", get(reports::page_performance))
        .route("/behavior/journeys", get(reports::user_journeys))
        .route("/behavior/pc-builds", get(reports::pc_build_insights))
        .route("/behavior/auth", get(reports::auth_activity));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api/tracking", tracking_routes)
        .nest("/api/analytics", analytics_routes)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .layer(cors)
        .with_state(state)
}
