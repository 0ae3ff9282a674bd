//! Order reports over every order status.

use crate::tally::{rank_desc, Tally};
use crate::{observe, AnalyticsError, DECIMALS};
use serde::Serialize;
use std::sync::Arc;
use storefront_insights_core::coerce::{count_f64, percentage, ratio, round_to};
use storefront_insights_core::store::{CommerceCatalog, OrderStatus};
use storefront_insights_core::time::ReportWindow;

/// Order counts and rates.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// Orders placed in the window.
    pub total_orders: u64,
    /// Sum of their totals, any status.
    pub total_value: f64,
    /// Delivered, paid or completed.
    pub completed_orders: u64,
    /// Cancelled.
    pub cancelled_orders: u64,
    /// Refunded.
    pub refunded_orders: u64,
    /// Pending, confirmed, processing or shipping.
    pub pending_orders: u64,
    /// Percent of orders completed.
    pub completion_rate: f64,
    /// Percent of orders cancelled.
    pub cancellation_rate: f64,
    /// Percent of orders refunded.
    pub refund_rate: f64,
    /// Units per order.
    pub average_items_per_order: f64,
}

/// Orders in one status.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    /// Stored status value.
    pub status: String,
    /// Orders.
    pub count: u64,
    /// Percent of all orders.
    pub share: f64,
    /// Sum of order totals.
    pub value: f64,
}

/// One day of order flow.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyOrders {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Orders placed.
    pub created: u64,
    /// Of those, completed.
    pub completed: u64,
    /// Of those, cancelled.
    pub cancelled: u64,
    /// Revenue of the completed ones.
    pub revenue: f64,
}

#[derive(Default)]
struct DayBucket {
    created: u64,
    completed: u64,
    cancelled: u64,
    revenue: f64,
}

/// Order reports.
#[derive(Clone)]
pub struct OrderAnalytics {
    catalog: Arc<dyn CommerceCatalog>,
}

impl OrderAnalytics {
    /// Create the service over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn CommerceCatalog>) -> Self {
        Self { catalog }
    }

    /// Counts per outcome and the derived rates.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn summary(&self, window: ReportWindow) -> Result<OrderSummary, AnalyticsError> {
        observe("orders.summary", async {
            let orders = self.catalog.orders(window, Vec::new()).await?;
            let lines = self.catalog.order_lines(window, Vec::new()).await?;

            let total = orders.len() as u64;
            let count = |pred: fn(&OrderStatus) -> bool| {
                orders.iter().filter(|o| pred(&o.status)).count() as u64
            };
            let completed = count(OrderStatus::is_revenue);
            let cancelled = count(|s| *s == OrderStatus::Cancelled);
            let refunded = count(|s| *s == OrderStatus::Refunded);
            let pending = count(OrderStatus::is_open);
            let items: u64 = lines.iter().map(|l| l.quantity).sum();

            Ok(OrderSummary {
                total_orders: total,
                total_value: round_to(orders.iter().map(|o| o.total_amount).sum(), DECIMALS),
                completed_orders: completed,
                cancelled_orders: cancelled,
                refunded_orders: refunded,
                pending_orders: pending,
                completion_rate: percentage(count_f64(completed), count_f64(total), DECIMALS),
                cancellation_rate: percentage(count_f64(cancelled), count_f64(total), DECIMALS),
                refund_rate: percentage(count_f64(refunded), count_f64(total), DECIMALS),
                average_items_per_order: ratio(count_f64(items), count_f64(total), DECIMALS),
            })
        })
        .await
    }

    /// Count, share and value per status, most common first.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn status_breakdown(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<StatusCount>, AnalyticsError> {
        observe("orders.status_breakdown", async {
            let orders = self.catalog.orders(window, Vec::new()).await?;
            let total = orders.len() as u64;

            let mut statuses: Tally<String, (u64, f64)> = Tally::new();
            for order in &orders {
                let bucket = statuses.entry(order.status.as_str().to_string());
                bucket.0 += 1;
                bucket.1 += order.total_amount;
            }

            let mut rows: Vec<StatusCount> = statuses
                .into_vec()
                .into_iter()
                .map(|(status, (count, value))| StatusCount {
                    status,
                    count,
                    share: percentage(count_f64(count), count_f64(total), DECIMALS),
                    value: round_to(value, DECIMALS),
                })
                .collect();
            rank_desc(&mut rows, usize::MAX, |row| count_f64(row.count));
            Ok(rows)
        })
        .await
    }

    /// Orders created, completed and cancelled per local day.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn daily_orders(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<DailyOrders>, AnalyticsError> {
        observe("orders.daily_orders", async {
            let orders = self.catalog.orders(window, Vec::new()).await?;

            let mut series = window.series::<DayBucket>();
            for order in &orders {
                let Some(bucket) = series.bucket_mut(window.local_day(order.created_at)) else {
                    continue;
                };
                bucket.created += 1;
                if order.status.is_revenue() {
                    bucket.completed += 1;
                    bucket.revenue += order.total_amount;
                } else if order.status == OrderStatus::Cancelled {
                    bucket.cancelled += 1;
                }
            }

            Ok(series.into_points(|date, day| DailyOrders {
                date,
                created: day.created,
                completed: day.completed,
                cancelled: day.cancelled,
                revenue: round_to(day.revenue, DECIMALS),
            }))
        })
        .await
    }
}
