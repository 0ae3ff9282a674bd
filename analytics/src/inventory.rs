//! Stock levels and product movement.

use crate::tally::{rank_desc, Tally};
use crate::{observe, AnalyticsError, DECIMALS};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use storefront_insights_core::coerce::{count_f64, percentage, round_to};
use storefront_insights_core::store::{CommerceCatalog, OrderStatus, ProductRecord};
use storefront_insights_core::time::ReportWindow;

/// A product and its stock.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    /// Product id.
    pub product_id: String,
    /// Product name.
    pub name: String,
    /// Category.
    pub category: Option<String>,
    /// Units on hand.
    pub stock_quantity: u64,
    /// Unit price.
    pub price: f64,
}

impl From<&ProductRecord> for StockItem {
    fn from(product: &ProductRecord) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            stock_quantity: product.stock_quantity,
            price: product.price,
        }
    }
}

/// Catalog-wide stock position.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOverview {
    /// Products in the catalog.
    pub product_count: u64,
    /// Units on hand.
    pub total_units: u64,
    /// `sum(price * stock)`.
    pub inventory_value: f64,
    /// The threshold used.
    pub low_stock_threshold: u64,
    /// Products with `0 < stock <= threshold`.
    pub low_stock_count: u64,
    /// Products with no stock.
    pub out_of_stock_count: u64,
    /// Products at or below the threshold, lowest stock first.
    pub low_stock: Vec<StockItem>,
}

/// A product that sold in the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FastMover {
    /// Product id.
    pub product_id: String,
    /// Catalog name.
    pub name: Option<String>,
    /// Category.
    pub category: Option<String>,
    /// Units sold in the window.
    pub units_sold: u64,
    /// Units on hand now.
    pub stock_quantity: u64,
    /// `100 * sold / (sold + stock)`.
    pub sell_through_rate: f64,
}

/// A stocked product with no sales in the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowMover {
    /// Product id.
    pub product_id: String,
    /// Product name.
    pub name: String,
    /// Category.
    pub category: Option<String>,
    /// Units on hand.
    pub stock_quantity: u64,
    /// `price * stock`.
    pub stock_value: f64,
}

/// Fast and slow movers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    /// Most units sold first.
    pub fast_movers: Vec<FastMover>,
    /// Highest tied-up stock value first.
    pub slow_movers: Vec<SlowMover>,
}

/// Inventory reports.
#[derive(Clone)]
pub struct InventoryAnalytics {
    catalog: Arc<dyn CommerceCatalog>,
}

impl InventoryAnalytics {
    /// Create the service over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn CommerceCatalog>) -> Self {
        Self { catalog }
    }

    /// Stock totals and the products at or below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the catalog query fails.
    pub async fn stock_overview(&self, threshold: u64) -> Result<StockOverview, AnalyticsError> {
        observe("inventory.stock_overview", async {
            let products = self.catalog.products().await?;

            let mut low_stock: Vec<StockItem> = products
                .iter()
                .filter(|p| p.stock_quantity <= threshold)
                .map(StockItem::from)
                .collect();
            low_stock.sort_by_key(|item| item.stock_quantity);

            Ok(StockOverview {
                product_count: products.len() as u64,
                total_units: products.iter().map(|p| p.stock_quantity).sum(),
                inventory_value: round_to(
                    products
                        .iter()
                        .map(|p| p.price * count_f64(p.stock_quantity))
                        .sum(),
                    DECIMALS,
                ),
                low_stock_threshold: threshold,
                low_stock_count: products
                    .iter()
                    .filter(|p| p.stock_quantity > 0 && p.stock_quantity <= threshold)
                    .count() as u64,
                out_of_stock_count: products.iter().filter(|p| p.stock_quantity == 0).count()
                    as u64,
                low_stock,
            })
        })
        .await
    }

    /// Products that sold in the window and stocked products that did not.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if a catalog query fails.
    pub async fn movement(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<InventoryMovement, AnalyticsError> {
        observe("inventory.movement", async {
            let lines = self
                .catalog
                .order_lines(window, OrderStatus::REVENUE.to_vec())
                .await?;
            let products = self.catalog.products().await?;
            let by_id: HashMap<&str, &ProductRecord> =
                products.iter().map(|p| (p.id.as_str(), p)).collect();

            let mut sold: Tally<String, u64> = Tally::new();
            for line in &lines {
                *sold.entry(line.product_id.clone()) += line.quantity;
            }

            let mut slow_movers: Vec<SlowMover> = products
                .iter()
                .filter(|p| p.stock_quantity > 0 && sold.get(&p.id).is_none())
                .map(|p| SlowMover {
                    product_id: p.id.clone(),
                    name: p.name.clone(),
                    category: p.category.clone(),
                    stock_quantity: p.stock_quantity,
                    stock_value: round_to(p.price * count_f64(p.stock_quantity), DECIMALS),
                })
                .collect();
            rank_desc(&mut slow_movers, limit, |row| row.stock_value);

            let mut fast_movers: Vec<FastMover> = sold
                .into_vec()
                .into_iter()
                .map(|(product_id, units_sold)| {
                    let product = by_id.get(product_id.as_str());
                    let stock = product.map_or(0, |p| p.stock_quantity);
                    FastMover {
                        name: product.map(|p| p.name.clone()),
                        category: product.and_then(|p| p.category.clone()),
                        units_sold,
                        stock_quantity: stock,
                        sell_through_rate: percentage(
                            count_f64(units_sold),
                            count_f64(units_sold + stock),
                            DECIMALS,
                        ),
                        product_id,
                    }
                })
                .collect();
            rank_desc(&mut fast_movers, limit, |row| count_f64(row.units_sold));

            Ok(InventoryMovement {
                fast_movers,
                slow_movers,
            })
        })
        .await
    }
}
