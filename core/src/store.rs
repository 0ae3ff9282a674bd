//! Persistence seams: the behavior event store and the commerce reference data.
//!
//! The write path (`BehaviorEventWriter`) is used only by the ingestion
//! consumer. Reports go through `BehaviorEventReader` and `CommerceCatalog`,
//! whose grouped operations are pushed down to the database where one exists.
//!
//! # Implementations
//!
//! - `PostgresEventStore` / `PostgresCatalog` (postgres crate): production
//! - `InMemoryEventStore` / `InMemoryCatalog` (testing crate): deterministic tests
//!
//! All traits return boxed futures so they can be shared as `Arc<dyn _>`
//! between the consumer, the report services and the HTTP state.

use crate::event::{BehaviorEvent, EventKind, NewBehaviorEvent};
use crate::time::ReportWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Database connection or query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The request itself was invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Row selection for [`BehaviorEventReader::events`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventQuery {
    /// Time window.
    pub window: ReportWindow,
    /// Kinds to return; empty means every kind.
    pub kinds: Vec<EventKind>,
}

impl EventQuery {
    /// Every event in `window`.
    #[must_use]
    pub const fn all(window: ReportWindow) -> Self {
        Self {
            window,
            kinds: Vec::new(),
        }
    }

    /// Events of `kinds` in `window`.
    #[must_use]
    pub fn of(window: ReportWindow, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            window,
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Whether `event` matches the kind filter and the window.
    #[must_use]
    pub fn matches(&self, event: &BehaviorEvent) -> bool {
        self.window.contains(event.created_at)
            && (self.kinds.is_empty() || self.kinds.contains(&event.event_type))
    }

    /// Storage tags of the kind filter.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.kinds.iter().map(|k| k.as_str().to_string()).collect()
    }
}

/// One session reconstructed from its events in a window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session key.
    pub session_id: String,
    /// Earliest event.
    pub first_seen: DateTime<Utc>,
    /// Latest event.
    pub last_seen: DateTime<Utc>,
    /// Number of events.
    pub event_count: u64,
    /// Distinct meaningful interaction kinds, sorted by tag.
    pub meaningful_kinds: Vec<EventKind>,
    /// Whether any event carried a customer id.
    pub authenticated: bool,
    /// Smallest customer id seen in the session.
    pub customer_id: Option<i64>,
}

impl SessionSummary {
    /// Seconds between first and last event.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        (self.last_seen - self.first_seen).num_seconds()
    }
}

/// Distinct sessions that fired a given kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReach {
    /// Step kind.
    pub event_type: EventKind,
    /// Distinct sessions.
    pub sessions: u64,
}

/// Sessions of one weekly cohort active in a given week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CohortCell {
    /// Monday of the week of the sessions' first-ever event.
    pub cohort_week: NaiveDate,
    /// Monday of the activity week.
    pub activity_week: NaiveDate,
    /// Distinct sessions.
    pub sessions: u64,
}

/// Sessions sharing one device profile.
///
/// A session's profile is the first non-null `deviceInfo` it carries in the
/// window, so every session lands in exactly one row.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceCount {
    /// The profile blob, `None` for sessions that never sent one.
    pub device_info: Option<serde_json::Value>,
    /// Sessions with this profile.
    pub sessions: u64,
    /// Events of those sessions.
    pub events: u64,
}

/// Views and sessions of one page URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageCount {
    /// Page URL as recorded.
    pub page_url: Option<String>,
    /// Events.
    pub views: u64,
    /// Distinct sessions.
    pub sessions: u64,
}

/// Order lifecycle status as stored in the orders table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Placed, not yet confirmed.
    Pending,
    /// Confirmed by the shop.
    Confirmed,
    /// Being prepared.
    Processing,
    /// Handed to the carrier.
    Shipping,
    /// Delivered.
    Delivered,
    /// Paid online.
    PaymentSuccess,
    /// Closed successfully.
    Completed,
    /// Cancelled.
    Cancelled,
    /// Refunded.
    Refunded,
    /// Any other stored value.
    Other(String),
}

impl OrderStatus {
    /// Statuses that count as realised revenue.
    pub const REVENUE: [Self; 3] = [Self::Delivered, Self::PaymentSuccess, Self::Completed];

    /// Statuses still in flight.
    pub const OPEN: [Self; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipping,
    ];

    /// Parse a stored value, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "CONFIRMED" => Self::Confirmed,
            "PROCESSING" => Self::Processing,
            "SHIPPING" => Self::Shipping,
            "DELIVERED" => Self::Delivered,
            "PAYMENT_SUCCESS" => Self::PaymentSuccess,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            "REFUNDED" => Self::Refunded,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Stored value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipping => "SHIPPING",
            Self::Delivered => "DELIVERED",
            Self::PaymentSuccess => "PAYMENT_SUCCESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
            Self::Other(value) => value,
        }
    }

    /// Delivered, paid or completed.
    #[must_use]
    pub fn is_revenue(&self) -> bool {
        Self::REVENUE.contains(self)
    }

    /// Not yet delivered, paid, cancelled or refunded.
    #[must_use]
    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order header.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderRecord {
    /// Order id.
    pub id: String,
    /// Ordering customer.
    pub customer_id: Option<i64>,
    /// Current status.
    pub status: OrderStatus,
    /// Order total, coerced.
    pub total_amount: f64,
    /// Placement time.
    pub created_at: DateTime<Utc>,
}

/// One order line joined with its product.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderLineRecord {
    /// Parent order.
    pub order_id: String,
    /// Status of the parent order.
    pub status: OrderStatus,
    /// Product id.
    pub product_id: String,
    /// Product name, when the product still exists.
    pub product_name: Option<String>,
    /// Product category.
    pub category: Option<String>,
    /// Units, coerced.
    pub quantity: u64,
    /// Unit price, coerced.
    pub unit_price: f64,
    /// Placement time of the parent order.
    pub created_at: DateTime<Utc>,
}

impl OrderLineRecord {
    /// `quantity * unit_price`.
    #[must_use]
    pub fn line_total(&self) -> f64 {
        crate::coerce::count_f64(self.quantity) * self.unit_price
    }
}

/// A catalog product.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductRecord {
    /// Product id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category label.
    pub category: Option<String>,
    /// Current price, coerced.
    pub price: f64,
    /// Units in stock; negative stored values read as zero.
    pub stock_quantity: u64,
    /// Last catalog update.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Append-only write path for behavior events.
pub trait BehaviorEventWriter: Send + Sync {
    /// Persist one event and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn insert(&self, event: NewBehaviorEvent) -> StoreFuture<'_, BehaviorEvent>;

    /// Upsert the recently-viewed record of `(customer_id, product_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the upsert fails or the product id is rejected.
    fn record_viewed_product(&self, customer_id: i64, product_id: String) -> StoreFuture<'_, ()>;
}

/// Read path over behavior events. Windows are `created_at >= from AND created_at < to`.
pub trait BehaviorEventReader: Send + Sync {
    /// Events matching `query`, ordered by `(created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn events(&self, query: EventQuery) -> StoreFuture<'_, Vec<BehaviorEvent>>;

    /// One summary per session with events in `window`, ordered by first event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn session_summaries(&self, window: ReportWindow) -> StoreFuture<'_, Vec<SessionSummary>>;

    /// Distinct sessions per step kind; kinds nobody reached may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn sessions_reaching(
        &self,
        window: ReportWindow,
        steps: Vec<EventKind>,
    ) -> StoreFuture<'_, Vec<StepReach>>;

    /// Weekly cohort activity for sessions whose first-ever event lies in `window`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn cohort_activity(&self, window: ReportWindow) -> StoreFuture<'_, Vec<CohortCell>>;

    /// Sessions and events per session device profile, most sessions first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn device_breakdown(&self, window: ReportWindow) -> StoreFuture<'_, Vec<DeviceCount>>;

    /// Views and sessions per page URL for events of `kinds`, most viewed first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn page_counts(
        &self,
        window: ReportWindow,
        kinds: Vec<EventKind>,
    ) -> StoreFuture<'_, Vec<PageCount>>;
}

/// Read-only commerce reference data.
pub trait CommerceCatalog: Send + Sync {
    /// Orders placed in `window` with one of `statuses` (empty means any), oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn orders(
        &self,
        window: ReportWindow,
        statuses: Vec<OrderStatus>,
    ) -> StoreFuture<'_, Vec<OrderRecord>>;

    /// Lines of those orders, joined with product name and category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn order_lines(
        &self,
        window: ReportWindow,
        statuses: Vec<OrderStatus>,
    ) -> StoreFuture<'_, Vec<OrderLineRecord>>;

    /// Every product, by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn products(&self) -> StoreFuture<'_, Vec<ProductRecord>>;

    /// Products with the given ids; unknown ids are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if an id is not a valid product key.
    fn products_by_ids(&self, ids: Vec<String>) -> StoreFuture<'_, Vec<ProductRecord>>;

    /// Customers registered in `window`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn customers_registered(&self, window: ReportWindow) -> StoreFuture<'_, u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_statuses() {
        assert!(OrderStatus::parse("delivered").is_revenue());
        assert!(OrderStatus::parse("PAYMENT_SUCCESS").is_revenue());
        assert!(OrderStatus::Completed.is_revenue());
        assert!(!OrderStatus::Cancelled.is_revenue());
        assert!(!OrderStatus::Refunded.is_revenue());
        assert!(OrderStatus::Shipping.is_open());
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = OrderStatus::parse("ON_HOLD");
        assert_eq!(status, OrderStatus::Other("ON_HOLD".to_string()));
        assert_eq!(status.to_string(), "ON_HOLD");
    }

    #[test]
    fn store_error_display() {
        let error = StoreError::Database("connection refused".to_string());
        assert_eq!(error.to_string(), "Database error: connection refused");
    }
}
