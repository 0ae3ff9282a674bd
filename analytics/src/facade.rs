//! Single entry point over the report services.
//!
//! The HTTP layer talks to one value instead of four services. Every method
//! forwards to exactly one service method and adds nothing.

use crate::behavior::auth::AuthActivity;
use crate::behavior::funnel::{CohortReport, Funnel};
use crate::behavior::pages::{DeviceBreakdown, PagePerformance, UserJourneys};
use crate::behavior::pc_build::PcBuildInsights;
use crate::behavior::products::{CartAbandonment, ViewedProduct};
use crate::behavior::search::SearchInsights;
use crate::behavior::visitors::{Engagement, VisitorOverview};
use crate::inventory::{InventoryMovement, StockOverview};
use crate::orders::{DailyOrders, OrderSummary, StatusCount};
use crate::sales::{BestSeller, CategoryRevenue, DailyRevenue, DiscountImpact, SalesSummary};
use crate::{AnalyticsError, BehaviorAnalytics, InventoryAnalytics, OrderAnalytics, SalesAnalytics};
use std::sync::Arc;
use storefront_insights_core::event::EventKind;
use storefront_insights_core::store::{BehaviorEventReader, CommerceCatalog};
use storefront_insights_core::time::ReportWindow;

/// All reports behind one handle. Cheap to clone.
#[derive(Clone)]
pub struct AnalyticsFacade {
    sales: SalesAnalytics,
    orders: OrderAnalytics,
    inventory: InventoryAnalytics,
    behavior: BehaviorAnalytics,
}

impl AnalyticsFacade {
    /// Build every service over the same stores.
    #[must_use]
    pub fn new(events: Arc<dyn BehaviorEventReader>, catalog: Arc<dyn CommerceCatalog>) -> Self {
        Self {
            sales: SalesAnalytics::new(Arc::clone(&catalog), Arc::clone(&events)),
            orders: OrderAnalytics::new(Arc::clone(&catalog)),
            inventory: InventoryAnalytics::new(Arc::clone(&catalog)),
            behavior: BehaviorAnalytics::new(events, catalog),
        }
    }

    /// Assemble from already configured services.
    #[must_use]
    pub const fn from_services(
        sales: SalesAnalytics,
        orders: OrderAnalytics,
        inventory: InventoryAnalytics,
        behavior: BehaviorAnalytics,
    ) -> Self {
        Self {
            sales,
            orders,
            inventory,
            behavior,
        }
    }

    // Sales

    /// See [`SalesAnalytics::summary`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn sales_summary(&self, window: ReportWindow) -> Result<SalesSummary, AnalyticsError> {
        self.sales.summary(window).await
    }

    /// See [`SalesAnalytics::daily_revenue`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn daily_revenue(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<DailyRevenue>, AnalyticsError> {
        self.sales.daily_revenue(window).await
    }

    /// See [`SalesAnalytics::best_sellers`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn best_sellers(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<Vec<BestSeller>, AnalyticsError> {
        self.sales.best_sellers(window, limit).await
    }

    /// See [`SalesAnalytics::revenue_by_category`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn revenue_by_category(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<CategoryRevenue>, AnalyticsError> {
        self.sales.revenue_by_category(window).await
    }

    /// See [`SalesAnalytics::discount_impact`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn discount_impact(
        &self,
        window: ReportWindow,
    ) -> Result<DiscountImpact, AnalyticsError> {
        self.sales.discount_impact(window).await
    }

    // Orders

    /// See [`OrderAnalytics::summary`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn order_summary(&self, window: ReportWindow) -> Result<OrderSummary, AnalyticsError> {
        self.orders.summary(window).await
    }

    /// See [`OrderAnalytics::status_breakdown`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn order_status_breakdown(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<StatusCount>, AnalyticsError> {
        self.orders.status_breakdown(window).await
    }

    /// See [`OrderAnalytics::daily_orders`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn daily_orders(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<DailyOrders>, AnalyticsError> {
        self.orders.daily_orders(window).await
    }

    // Inventory

    /// See [`InventoryAnalytics::stock_overview`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn stock_overview(&self, threshold: u64) -> Result<StockOverview, AnalyticsError> {
        self.inventory.stock_overview(threshold).await
    }

    /// See [`InventoryAnalytics::movement`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn inventory_movement(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<InventoryMovement, AnalyticsError> {
        self.inventory.movement(window, limit).await
    }

    // Behavior

    /// See [`BehaviorAnalytics::visitor_overview`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn visitor_overview(
        &self,
        window: ReportWindow,
    ) -> Result<VisitorOverview, AnalyticsError> {
        self.behavior.visitor_overview(window).await
    }

    /// See [`BehaviorAnalytics::engagement`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn engagement(&self, window: ReportWindow) -> Result<Engagement, AnalyticsError> {
        self.behavior.engagement(window).await
    }

    /// See [`BehaviorAnalytics::funnel`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn funnel(
        &self,
        window: ReportWindow,
        steps: Vec<EventKind>,
    ) -> Result<Funnel, AnalyticsError> {
        self.behavior.funnel(window, steps).await
    }

    /// See [`BehaviorAnalytics::cohorts`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn cohorts(&self, window: ReportWindow) -> Result<CohortReport, AnalyticsError> {
        self.behavior.cohorts(window).await
    }

    /// See [`BehaviorAnalytics::most_viewed_products`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn most_viewed_products(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<Vec<ViewedProduct>, AnalyticsError> {
        self.behavior.most_viewed_products(window, limit).await
    }

    /// See [`BehaviorAnalytics::cart_abandonment`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn cart_abandonment(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<CartAbandonment, AnalyticsError> {
        self.behavior.cart_abandonment(window, limit).await
    }

    /// See [`BehaviorAnalytics::search_insights`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn search_insights(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<SearchInsights, AnalyticsError> {
        self.behavior.search_insights(window, limit).await
    }

    /// See [`BehaviorAnalytics::device_breakdown`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn device_breakdown(
        &self,
        window: ReportWindow,
    ) -> Result<DeviceBreakdown, AnalyticsError> {
        self.behavior.device_breakdown(window).await
    }

    /// See [`BehaviorAnalytics::page_performance`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn page_performance(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<PagePerformance, AnalyticsError> {
        self.behavior.page_performance(window, limit).await
    }

    /// See [`BehaviorAnalytics::user_journeys`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn user_journeys(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<UserJourneys, AnalyticsError> {
        self.behavior.user_journeys(window, limit).await
    }

    /// See [`BehaviorAnalytics::pc_build_insights`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn pc_build_insights(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<PcBuildInsights, AnalyticsError> {
        self.behavior.pc_build_insights(window, limit).await
    }

    /// See [`BehaviorAnalytics::auth_activity`].
    ///
    /// # Errors
    ///
    /// Propagates the service error.
    pub async fn auth_activity(&self, window: ReportWindow) -> Result<AuthActivity, AnalyticsError> {
        self.behavior.auth_activity(window).await
    }
}
