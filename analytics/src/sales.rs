//! Sales reports over revenue-status orders and `discount_usage` events.

use crate::tally::{rank_desc, Tally};
use crate::{observe, AnalyticsError, DECIMALS};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use storefront_insights_core::coerce::{count_f64, percentage, ratio, round_to};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::payload::EventPayload;
use storefront_insights_core::store::{
    BehaviorEventReader, CommerceCatalog, EventQuery, OrderStatus,
};
use storefront_insights_core::time::ReportWindow;

/// Revenue totals.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    /// Sum of order totals.
    pub total_revenue: f64,
    /// Orders with a revenue status.
    pub order_count: u64,
    /// `total_revenue / order_count`.
    pub average_order_value: f64,
    /// Units across all lines of those orders.
    pub items_sold: u64,
}

/// One day of revenue.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Revenue booked that day.
    pub revenue: f64,
    /// Orders booked that day.
    pub orders: u64,
}

/// A product ranked by units sold.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSeller {
    /// Product id.
    pub product_id: String,
    /// Catalog name, if the product still exists.
    pub product_name: Option<String>,
    /// Catalog category.
    pub category: Option<String>,
    /// Units sold.
    pub quantity_sold: u64,
    /// Line revenue.
    pub revenue: f64,
    /// Distinct orders containing the product.
    pub orders: u64,
}

/// Revenue of one category.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRevenue {
    /// Category name, `Uncategorized` when unknown.
    pub category: String,
    /// Line revenue.
    pub revenue: f64,
    /// Units sold.
    pub quantity: u64,
    /// Share of all line revenue, percent.
    pub share: f64,
}

/// Usage of one discount code.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeStats {
    /// The code as entered, upper-cased.
    pub code: String,
    /// Times used.
    pub uses: u64,
    /// Discount granted.
    pub total_discount: f64,
    /// `total_discount / uses`.
    pub average_discount: f64,
    /// Order value the code was applied to.
    pub order_value: f64,
}

/// One day of discount usage.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDiscount {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Codes used that day.
    pub uses: u64,
    /// Discount granted that day.
    pub discount: f64,
}

/// What discounts cost and what they were applied to.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountImpact {
    /// Discount granted.
    pub total_discount: f64,
    /// `discount_usage` events.
    pub usage_count: u64,
    /// Distinct codes.
    pub unique_codes: u64,
    /// `total_discount / usage_count`.
    pub average_discount: f64,
    /// Sum of `orderTotal` across usages.
    pub discounted_order_value: f64,
    /// `100 * total_discount / (discounted_order_value + total_discount)`.
    pub discount_rate: f64,
    /// Per-code usage, most used first.
    pub codes: Vec<DiscountCodeStats>,
    /// Dense daily series.
    pub daily: Vec<DailyDiscount>,
}

#[derive(Default)]
struct ProductSales {
    name: Option<String>,
    category: Option<String>,
    quantity: u64,
    revenue: f64,
    orders: HashSet<String>,
}

#[derive(Default)]
struct CodeUsage {
    uses: u64,
    discount: f64,
    order_value: f64,
}

/// Sales reports.
///
/// Revenue counts only orders whose status is DELIVERED, `PAYMENT_SUCCESS` or
/// COMPLETED.
#[derive(Clone)]
pub struct SalesAnalytics {
    catalog: Arc<dyn CommerceCatalog>,
    events: Arc<dyn BehaviorEventReader>,
}

impl SalesAnalytics {
    /// Create the service over a catalog and the event store.
    #[must_use]
    pub fn new(catalog: Arc<dyn CommerceCatalog>, events: Arc<dyn BehaviorEventReader>) -> Self {
        Self { catalog, events }
    }

    /// Revenue, order count, average order value and units sold.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn summary(&self, window: ReportWindow) -> Result<SalesSummary, AnalyticsError> {
        observe("sales.summary", async {
            let orders = self
                .catalog
                .orders(window, OrderStatus::REVENUE.to_vec())
                .await?;
            let lines = self
                .catalog
                .order_lines(window, OrderStatus::REVENUE.to_vec())
                .await?;

            let total_revenue: f64 = orders.iter().map(|o| o.total_amount).sum();
            let order_count = orders.len() as u64;
            Ok(SalesSummary {
                total_revenue: round_to(total_revenue, DECIMALS),
                order_count,
                average_order_value: ratio(total_revenue, count_f64(order_count), DECIMALS),
                items_sold: lines.iter().map(|l| l.quantity).sum(),
            })
        })
        .await
    }

    /// Revenue and order count per local day.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn daily_revenue(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<DailyRevenue>, AnalyticsError> {
        observe("sales.daily_revenue", async {
            let orders = self
                .catalog
                .orders(window, OrderStatus::REVENUE.to_vec())
                .await?;

            let mut series = window.series::<(f64, u64)>();
            for order in &orders {
                if let Some(bucket) = series.bucket_mut(window.local_day(order.created_at)) {
                    bucket.0 += order.total_amount;
                    bucket.1 += 1;
                }
            }
            Ok(series.into_points(|date, (revenue, orders)| DailyRevenue {
                date,
                revenue: round_to(revenue, DECIMALS),
                orders,
            }))
        })
        .await
    }

    /// Products ranked by units sold.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn best_sellers(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<Vec<BestSeller>, AnalyticsError> {
        observe("sales.best_sellers", async {
            let lines = self
                .catalog
                .order_lines(window, OrderStatus::REVENUE.to_vec())
                .await?;

            let mut products: Tally<String, ProductSales> = Tally::new();
            for line in lines {
                let product = products.entry(line.product_id.clone());
                product.quantity += line.quantity;
                product.revenue += line.line_total();
                if product.name.is_none() {
                    product.name.clone_from(&line.product_name);
                    product.category.clone_from(&line.category);
                }
                product.orders.insert(line.order_id);
            }

            let mut rows: Vec<BestSeller> = products
                .into_vec()
                .into_iter()
                .map(|(product_id, sales)| BestSeller {
                    product_id,
                    product_name: sales.name,
                    category: sales.category,
                    quantity_sold: sales.quantity,
                    revenue: round_to(sales.revenue, DECIMALS),
                    orders: sales.orders.len() as u64,
                })
                .collect();
            rank_desc(&mut rows, limit, |row| count_f64(row.quantity_sold));
            Ok(rows)
        })
        .await
    }

    /// Line revenue per product category.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn revenue_by_category(
        &self,
        window: ReportWindow,
    ) -> Result<Vec<CategoryRevenue>, AnalyticsError> {
        observe("sales.revenue_by_category", async {
            let lines = self
                .catalog
                .order_lines(window, OrderStatus::REVENUE.to_vec())
                .await?;

            let mut categories: Tally<String, (f64, u64)> = Tally::new();
            for line in &lines {
                let category = line
                    .category
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| "Uncategorized".to_string());
                let bucket = categories.entry(category);
                bucket.0 += line.line_total();
                bucket.1 += line.quantity;
            }

            let total: f64 = lines.iter().map(|line| line.line_total()).sum();
            let mut rows: Vec<CategoryRevenue> = categories
                .into_vec()
                .into_iter()
                .map(|(category, (revenue, quantity))| CategoryRevenue {
                    category,
                    revenue: round_to(revenue, DECIMALS),
                    quantity,
                    share: percentage(revenue, total, DECIMALS),
                })
                .collect();
            rank_desc(&mut rows, usize::MAX, |row| row.revenue);
            Ok(rows)
        })
        .await
    }

    /// Discount code usage from `discount_usage` events.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the event query fails.
    pub async fn discount_impact(
        &self,
        window: ReportWindow,
    ) -> Result<DiscountImpact, AnalyticsError> {
        observe("sales.discount_impact", async {
            let events = self
                .events
                .events(EventQuery::of(window, [EventKind::DiscountUsage]))
                .await?;

            let mut codes: Tally<String, CodeUsage> = Tally::new();
            let mut series = window.series::<(u64, f64)>();
            let (mut usage_count, mut total_discount, mut order_value) = (0_u64, 0.0, 0.0);

            for event in &events {
                let discount = match event.payload() {
                    Ok(EventPayload::Discount(discount)) => discount,
                    Ok(_) => continue,
                    Err(error) => {
                        tracing::warn!(event_id = event.id, error = %error, "Skipping discount event");
                        continue;
                    },
                };

                usage_count += 1;
                total_discount += discount.discount_amount;
                order_value += discount.order_total;

                let code = codes.entry(discount.discount_code.trim().to_uppercase());
                code.uses += 1;
                code.discount += discount.discount_amount;
                code.order_value += discount.order_total;

                if let Some(bucket) = series.bucket_mut(window.local_day(event.created_at)) {
                    bucket.0 += 1;
                    bucket.1 += discount.discount_amount;
                }
            }

            let unique_codes = codes.len() as u64;
            let mut code_rows: Vec<DiscountCodeStats> = codes
                .into_vec()
                .into_iter()
                .map(|(code, usage)| DiscountCodeStats {
                    code,
                    uses: usage.uses,
                    total_discount: round_to(usage.discount, DECIMALS),
                    average_discount: ratio(usage.discount, count_f64(usage.uses), DECIMALS),
                    order_value: round_to(usage.order_value, DECIMALS),
                })
                .collect();
            rank_desc(&mut code_rows, usize::MAX, |row| count_f64(row.uses));

            Ok(DiscountImpact {
                total_discount: round_to(total_discount, DECIMALS),
                usage_count,
                unique_codes,
                average_discount: ratio(total_discount, count_f64(usage_count), DECIMALS),
                discounted_order_value: round_to(order_value, DECIMALS),
                discount_rate: percentage(total_discount, order_value + total_discount, DECIMALS),
                codes: code_rows,
                daily: series.into_points(|date, (uses, discount)| DailyDiscount {
                    date,
                    uses,
                    discount: round_to(discount, DECIMALS),
                }),
            })
        })
        .await
    }
}
