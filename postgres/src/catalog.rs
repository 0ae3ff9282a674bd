//! Read-only commerce reference data.

use crate::db_error;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use storefront_insights_core::coerce::{coerce_u64, parse_decimal};
use storefront_insights_core::store::{
    CommerceCatalog, OrderLineRecord, OrderRecord, OrderStatus, ProductRecord, StoreError,
    StoreFuture,
};
use storefront_insights_core::time::ReportWindow;
use uuid::Uuid;

/// PostgreSQL-backed reader over `products`, `orders`, `order_items` and `customers`.
#[derive(Clone, Debug)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn statuses(statuses: &[OrderStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn quantity(text: Option<String>) -> u64 {
    text.map_or(0, |s| coerce_u64(&serde_json::Value::String(s)))
}

type ProductRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<DateTime<Utc>>,
);

fn product(row: ProductRow) -> ProductRecord {
    let (id, name, category, price, stock, updated_at) = row;
    ProductRecord {
        id,
        name,
        category,
        price: parse_decimal(price.as_deref()),
        stock_quantity: quantity(stock),
        updated_at,
    }
}

impl CommerceCatalog for PostgresCatalog {
    fn orders(
        &self,
        window: ReportWindow,
        statuses_filter: Vec<OrderStatus>,
    ) -> StoreFuture<'_, Vec<OrderRecord>> {
        Box::pin(async move {
            let rows: Vec<(String, Option<i64>, String, Option<String>, DateTime<Utc>)> =
                sqlx::query_as(
                    r"
                    SELECT id::text, customer_id, status, total_amount::text, created_at
                    FROM orders
                    WHERE created_at >= $1 AND created_at < $2
                      AND (cardinality($3::text[]) = 0 OR status = ANY($3))
                    ORDER BY created_at, id
                    ",
                )
                .bind(window.from_utc())
                .bind(window.to_utc())
                .bind(statuses(&statuses_filter))
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("Failed to query orders"))?;

            Ok(rows
                .into_iter()
                .map(|(id, customer_id, status, total, created_at)| OrderRecord {
                    id,
                    customer_id,
                    status: OrderStatus::parse(&status),
                    total_amount: parse_decimal(total.as_deref()),
                    created_at,
                })
                .collect())
        })
    }

    fn order_lines(
        &self,
        window: ReportWindow,
        statuses_filter: Vec<OrderStatus>,
    ) -> StoreFuture<'_, Vec<OrderLineRecord>> {
        Box::pin(async move {
            #[allow(clippy::type_complexity)]
            let rows: Vec<(
                String,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                DateTime<Utc>,
            )> = sqlx::query_as(
                r"
                SELECT o.id::text, o.status, oi.product_id::text, p.name, p.category,
                       oi.quantity::text, oi.price::text, o.created_at
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                LEFT JOIN products p ON p.id = oi.product_id
                WHERE o.created_at >= $1 AND o.created_at < $2
                  AND (cardinality($3::text[]) = 0 OR o.status = ANY($3))
                ORDER BY o.created_at, o.id, oi.id
                ",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .bind(statuses(&statuses_filter))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query order lines"))?;

            Ok(rows
                .into_iter()
                .filter_map(
                    |(order_id, status, product_id, name, category, qty, price, created_at)| {
                        Some(OrderLineRecord {
                            order_id,
                            status: OrderStatus::parse(&status),
                            product_id: product_id?,
                            product_name: name,
                            category,
                            quantity: quantity(qty),
                            unit_price: parse_decimal(price.as_deref()),
                            created_at,
                        })
                    },
                )
                .collect())
        })
    }

    fn products(&self) -> StoreFuture<'_, Vec<ProductRecord>> {
        Box::pin(async move {
            let rows: Vec<ProductRow> = sqlx::query_as(
                r"
                SELECT id::text, name, category, price::text, stock_quantity::text, updated_at
                FROM products
                ORDER BY name, id
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query products"))?;
            Ok(rows.into_iter().map(product).collect())
        })
    }

    fn products_by_ids(&self, ids: Vec<String>) -> StoreFuture<'_, Vec<ProductRecord>> {
        Box::pin(async move {
            let ids = ids
                .iter()
                .map(|id| {
                    Uuid::parse_str(id.trim()).map_err(|e| {
                        StoreError::InvalidInput(format!("product id {id:?} is not a UUID: {e}"))
                    })
                })
                .collect::<Result<Vec<Uuid>, StoreError>>()?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let rows: Vec<ProductRow> = sqlx::query_as(
                r"
                SELECT id::text, name, category, price::text, stock_quantity::text, updated_at
                FROM products
                WHERE id = ANY($1)
                ",
            )
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query products by id"))?;
            Ok(rows.into_iter().map(product).collect())
        })
    }

    fn customers_registered(&self, window: ReportWindow) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (registered,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM customers WHERE created_at >= $1 AND created_at < $2",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count customers"))?;
            Ok(u64::try_from(registered).unwrap_or(0))
        })
    }
}
