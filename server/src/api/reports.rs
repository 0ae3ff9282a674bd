//! Report endpoints.
//!
//! Windowed reports take `startDate` and `endDate` (`YYYY-MM-DD`, end
//! exclusive) and an optional IANA `timezone`; list reports also take
//! `limit`. A bad date, a reversed or oversized range, or an unknown
//! timezone answers 400. A store failure answers 500.
//!
//! ```bash
//! curl 'http://localhost:8080/api/analytics/behavior/visitors?startDate=2024-03-01&endDate=2024-03-08'
//! ```

use super::{analytics_error, query_params};
use crate::config::AnalyticsConfig;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use storefront_insights_analytics::behavior::auth::AuthActivity;
use storefront_insights_analytics::behavior::funnel::{CohortReport, Funnel};
use storefront_insights_analytics::behavior::pages::{DeviceBreakdown, PagePerformance, UserJourneys};
use storefront_insights_analytics::behavior::pc_build::PcBuildInsights;
use storefront_insights_analytics::behavior::products::{CartAbandonment, ViewedProduct};
use storefront_insights_analytics::behavior::search::SearchInsights;
use storefront_insights_analytics::behavior::visitors::{Engagement, VisitorOverview};
use storefront_insights_analytics::inventory::{InventoryMovement, StockOverview};
use storefront_insights_analytics::orders::{DailyOrders, OrderSummary, StatusCount};
use storefront_insights_analytics::sales::{
    BestSeller, CategoryRevenue, DailyRevenue, DiscountImpact, SalesSummary,
};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::time::{parse_timezone, DateRange, ReportWindow};
use storefront_insights_core::NaiveDate;
use storefront_insights_web::{AppError, WebResult};

/// Query string shared by the windowed reports.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    /// First local day of the window
    pub start_date: NaiveDate,
    /// Day after the last local day of the window
    pub end_date: NaiveDate,
    /// IANA name; the configured reporting timezone when absent
    #[serde(default)]
    pub timezone: Option<String>,
    /// Row cap for list reports
    #[serde(default)]
    pub limit: Option<usize>,
    /// Comma-separated funnel steps
    #[serde(default)]
    pub steps: Option<String>,
}

impl ReportQuery {
    /// Resolve the reporting window.
    ///
    /// # Errors
    ///
    /// 400 for an unknown timezone or an empty or oversized range.
    pub fn window(&self, settings: &AnalyticsConfig) -> Result<ReportWindow, AppError> {
        let tz = match self.timezone.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => parse_timezone(name)?,
            _ => settings.tz()?,
        };
        let range = DateRange::new(self.start_date, self.end_date, settings.max_range_days)?;
        Ok(ReportWindow::new(range, tz))
    }

    /// Requested row cap, clamped to the configured bounds.
    #[must_use]
    pub fn limit(&self, settings: &AnalyticsConfig) -> usize {
        settings.limit(self.limit)
    }

    /// Funnel steps in request order; empty when none were given.
    #[must_use]
    pub fn steps(&self) -> Vec<EventKind> {
        self.steps
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(EventKind::parse)
            .collect()
    }
}

/// Query string of the stock report.
#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    /// Stock at or below this counts as low
    #[serde(default)]
    pub threshold: Option<u64>,
}

fn resolve(
    state: &AppState,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<(ReportWindow, ReportQuery), AppError> {
    let query = query_params(query)?;
    let window = query.window(&state.settings)?;
    Ok((window, query))
}

// Sales

/// `GET /api/analytics/sales/summary`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn sales_summary(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<SalesSummary>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.sales_summary(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/sales/daily`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn daily_revenue(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Vec<DailyRevenue>>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.daily_revenue(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/sales/best-sellers`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn best_sellers(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Vec<BestSeller>>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.best_sellers(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/sales/categories`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn revenue_by_category(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Vec<CategoryRevenue>>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.revenue_by_category(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/sales/discounts`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn discount_impact(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<DiscountImpact>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.discount_impact(window).await.map_err(analytics_error)?))
}

// Orders

/// `GET /api/analytics/orders/summary`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn order_summary(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<OrderSummary>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.order_summary(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/orders/status`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn order_status_breakdown(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Vec<StatusCount>>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.order_status_breakdown(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/orders/daily`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn daily_orders(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Vec<DailyOrders>>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.daily_orders(window).await.map_err(analytics_error)?))
}

// Inventory

/// `GET /api/analytics/inventory/stock`
///
/// Takes no window; `threshold` defaults to the configured low-stock level.
///
/// # Errors
///
/// 400 for a malformed threshold, 500 when the store fails.
pub async fn stock_overview(
    State(state): State<AppState>,
    query: Result<Query<StockQuery>, QueryRejection>,
) -> WebResult<Json<StockOverview>> {
    let query = query_params(query)?;
    let threshold = query.threshold.unwrap_or(state.settings.low_stock_threshold);
    Ok(Json(state.analytics.stock_overview(threshold).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/inventory/movement`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn inventory_movement(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<InventoryMovement>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.inventory_movement(window, limit).await.map_err(analytics_error)?))
}

// Behavior

/// `GET /api/analytics/behavior/visitors`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn visitor_overview(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<VisitorOverview>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.visitor_overview(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/engagement`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn engagement(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Engagement>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.engagement(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/funnel?steps=product_viewed,checkout_started`
///
/// # Errors
///
/// 400 for an invalid window or an unknown step, 500 when the store fails.
pub async fn funnel(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Funnel>> {
    let (window, query) = resolve(&state, query)?;
    Ok(Json(state.analytics.funnel(window, query.steps()).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/cohorts`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn cohorts(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<CohortReport>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.cohorts(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/products`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn most_viewed_products(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<Vec<ViewedProduct>>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.most_viewed_products(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/cart-abandonment`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn cart_abandonment(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<CartAbandonment>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.cart_abandonment(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/search`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn search_insights(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<SearchInsights>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.search_insights(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/devices`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn device_breakdown(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<DeviceBreakdown>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.device_breakdown(window).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/pages`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn page_performance(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<PagePerformance>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.page_performance(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/journeys`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn user_journeys(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<UserJourneys>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.user_journeys(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/pc-builds`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn pc_build_insights(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<PcBuildInsights>> {
    let (window, query) = resolve(&state, query)?;
    let limit = query.limit(&state.settings);
    Ok(Json(state.analytics.pc_build_insights(window, limit).await.map_err(analytics_error)?))
}

/// `GET /api/analytics/behavior/auth`
///
/// # Errors
///
/// 400 for an invalid window, 500 when the store fails.
pub async fn auth_activity(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> WebResult<Json<AuthActivity>> {
    let (window, _) = resolve(&state, query)?;
    Ok(Json(state.analytics.auth_activity(window).await.map_err(analytics_error)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(start: &str, end: &str) -> ReportQuery {
        ReportQuery {
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
            timezone: None,
            limit: None,
            steps: None,
        }
    }

    #[test]
    fn test_window_uses_configured_timezone() {
        let settings = AnalyticsConfig::default();
        let window = query("2024-03-01", "2024-03-08").window(&settings).unwrap();

        assert_eq!(window.tz(), settings.tz().unwrap());
        assert_eq!(window.range().num_days(), 7);
    }

    #[test]
    fn test_window_honours_explicit_timezone() {
        let mut q = query("2024-03-01", "2024-03-02");
        q.timezone = Some("Europe/Paris".to_string());

        let window = q.window(&AnalyticsConfig::default()).unwrap();

        assert_eq!(window.tz(), parse_timezone("Europe/Paris").unwrap());
    }

    #[test]
    fn test_window_rejects_reversed_range() {
        let err = query("2024-03-08", "2024-03-01")
            .window(&AnalyticsConfig::default())
            .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_steps_are_split_and_trimmed() {
        let mut q = query("2024-03-01", "2024-03-02");
        q.steps = Some(" product_viewed, ,checkout_started,".to_string());

        assert_eq!(q.steps(), vec![EventKind::ProductViewed, EventKind::CheckoutStarted]);
        assert!(query("2024-03-01", "2024-03-02").steps().is_empty());
    }
}
