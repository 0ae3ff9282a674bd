//! In-memory commerce reference data.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use storefront_insights_core::store::{
    CommerceCatalog, OrderLineRecord, OrderRecord, OrderStatus, ProductRecord, StoreError,
    StoreFuture,
};
use storefront_insights_core::time::ReportWindow;

#[derive(Clone, Debug)]
struct Line {
    order_id: String,
    product_id: String,
    quantity: u64,
    unit_price: f64,
}

#[derive(Debug, Default)]
struct CatalogData {
    products: Vec<ProductRecord>,
    orders: Vec<OrderRecord>,
    lines: Vec<Line>,
    customers: Vec<DateTime<Utc>>,
}

/// Products, orders and customers held in memory.
///
/// # Example
///
/// ```
/// use storefront_insights_testing::{at, InMemoryCatalog};
/// use storefront_insights_core::store::OrderStatus;
///
/// let catalog = InMemoryCatalog::new()
///     .with_product("P1", "RTX 4070", Some("GPU"), 15_000_000.0, 4)
///     .with_order("O1", OrderStatus::Delivered, 15_000_000.0, at(2024, 3, 1, 9, 0, 0))
///     .with_line("O1", "P1", 1, 15_000_000.0);
/// assert_eq!(catalog.order_count(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    data: Arc<RwLock<CatalogData>>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product.
    #[must_use]
    pub fn with_product(
        self,
        id: &str,
        name: &str,
        category: Option<&str>,
        price: f64,
        stock_quantity: u64,
    ) -> Self {
        self.data.write().unwrap().products.push(ProductRecord {
            id: id.to_string(),
            name: name.to_string(),
            category: category.map(str::to_string),
            price,
            stock_quantity,
            updated_at: None,
        });
        self
    }

    /// Add an order header.
    #[must_use]
    pub fn with_order(
        self,
        id: &str,
        status: OrderStatus,
        total_amount: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        self.data.write().unwrap().orders.push(OrderRecord {
            id: id.to_string(),
            customer_id: None,
            status,
            total_amount,
            created_at,
        });
        self
    }

    /// Add a line to an existing order.
    #[must_use]
    pub fn with_line(self, order_id: &str, product_id: &str, quantity: u64, unit_price: f64) -> Self {
        self.data.write().unwrap().lines.push(Line {
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price,
        });
        self
    }

    /// Add a customer registered at `registered_at`.
    #[must_use]
    pub fn with_customer(self, registered_at: DateTime<Utc>) -> Self {
        self.data.write().unwrap().customers.push(registered_at);
        self
    }

    /// Number of order headers.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.data.read().unwrap().orders.len()
    }

    fn select_orders(data: &CatalogData, window: ReportWindow, statuses: &[OrderStatus]) -> Vec<OrderRecord> {
        let mut orders: Vec<OrderRecord> = data
            .orders
            .iter()
            .filter(|o| window.contains(o.created_at))
            .filter(|o| statuses.is_empty() || statuses.contains(&o.status))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orders
    }
}

impl CommerceCatalog for InMemoryCatalog {
    fn orders(
        &self,
        window: ReportWindow,
        statuses: Vec<OrderStatus>,
    ) -> StoreFuture<'_, Vec<OrderRecord>> {
        Box::pin(async move {
            let data = self.data.read().unwrap();
            Ok(Self::select_orders(&data, window, &statuses))
        })
    }

    fn order_lines(
        &self,
        window: ReportWindow,
        statuses: Vec<OrderStatus>,
    ) -> StoreFuture<'_, Vec<OrderLineRecord>> {
        Box::pin(async move {
            let data = self.data.read().unwrap();
            let orders = Self::select_orders(&data, window, &statuses);
            let mut lines = Vec::new();
            for order in &orders {
                for line in data.lines.iter().filter(|l| l.order_id == order.id) {
                    let product = data.products.iter().find(|p| p.id == line.product_id);
                    lines.push(OrderLineRecord {
                        order_id: order.id.clone(),
                        status: order.status.clone(),
                        product_id: line.product_id.clone(),
                        product_name: product.map(|p| p.name.clone()),
                        category: product.and_then(|p| p.category.clone()),
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                        created_at: order.created_at,
                    });
                }
            }
            Ok(lines)
        })
    }

    fn products(&self) -> StoreFuture<'_, Vec<ProductRecord>> {
        Box::pin(async move {
            let mut products = self.data.read().unwrap().products.clone();
            products.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(products)
        })
    }

    fn products_by_ids(&self, ids: Vec<String>) -> StoreFuture<'_, Vec<ProductRecord>> {
        Box::pin(async move {
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(StoreError::InvalidInput("empty product id".to_string()));
            }
            Ok(self
                .data
                .read()
                .unwrap()
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        })
    }

    fn customers_registered(&self, window: ReportWindow) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let data = self.data.read().unwrap();
            Ok(data.customers.iter().filter(|ts| window.contains(**ts)).count() as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{at, day, window};

    #[tokio::test]
    async fn order_lines_join_products_and_filter_status() {
        let catalog = InMemoryCatalog::new()
            .with_product("P1", "RTX 4070", Some("GPU"), 100.0, 3)
            .with_order("O1", OrderStatus::Delivered, 200.0, at(2024, 3, 1, 9, 0, 0))
            .with_line("O1", "P1", 2, 100.0)
            .with_order("O2", OrderStatus::Cancelled, 100.0, at(2024, 3, 1, 10, 0, 0))
            .with_line("O2", "P1", 1, 100.0);

        let lines = catalog
            .order_lines(
                window(day(2024, 3, 1), day(2024, 3, 2)),
                OrderStatus::REVENUE.to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_name.as_deref(), Some("RTX 4070"));
        assert_eq!(lines[0].category.as_deref(), Some("GPU"));
        assert!((lines[0].line_total() - 200.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unknown_product_ids_are_absent() {
        let catalog = InMemoryCatalog::new().with_product("P1", "SSD", None, 10.0, 1);
        let found = catalog
            .products_by_ids(vec!["P1".to_string(), "P9".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
