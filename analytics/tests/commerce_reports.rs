//! Sales, order and inventory reports over the in-memory catalog.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use std::sync::Arc;
use storefront_insights_analytics::{AnalyticsError, AnalyticsFacade};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::store::OrderStatus;
use storefront_insights_testing::{
    at, behavior, day, window, BehaviorEventFixture, InMemoryCatalog, InMemoryEventStore,
};

fn facade(events: InMemoryEventStore, catalog: InMemoryCatalog) -> AnalyticsFacade {
    AnalyticsFacade::new(Arc::new(events), Arc::new(catalog))
}

fn shop() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_product("P1", "RTX 4070", Some("GPU"), 100.0, 3)
        .with_product("P2", "Ryzen 7", Some("CPU"), 50.0, 0)
        .with_product("P3", "Case", None, 25.0, 40)
        .with_order("O1", OrderStatus::Delivered, 100.0, at(2024, 3, 1, 9, 0, 0))
        .with_line("O1", "P1", 1, 100.0)
        .with_order("O2", OrderStatus::PaymentSuccess, 250.0, at(2024, 3, 2, 14, 0, 0))
        .with_line("O2", "P1", 2, 100.0)
        .with_line("O2", "P2", 1, 50.0)
        .with_order("O3", OrderStatus::Cancelled, 80.0, at(2024, 3, 2, 15, 0, 0))
        .with_line("O3", "P2", 1, 50.0)
        .with_order("O4", OrderStatus::Pending, 40.0, at(2024, 3, 3, 8, 0, 0))
}

#[tokio::test]
async fn sales_summary_counts_only_revenue_orders() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let summary = reports
        .sales_summary(window(day(2024, 3, 1), day(2024, 3, 8)))
        .await
        .unwrap();

    assert!((summary.total_revenue - 350.0).abs() < f64::EPSILON);
    assert_eq!(summary.order_count, 2);
    assert!((summary.average_order_value - 175.0).abs() < f64::EPSILON);
    assert_eq!(summary.items_sold, 4);
}

#[tokio::test]
async fn daily_revenue_has_one_point_per_day() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let daily = reports
        .daily_revenue(window(day(2024, 3, 1), day(2024, 3, 5)))
        .await
        .unwrap();

    let dates: Vec<&str> = daily.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04"]);
    assert!((daily[1].revenue - 250.0).abs() < f64::EPSILON);
    assert_eq!(daily[2].orders, 0);
}

#[tokio::test]
async fn best_sellers_rank_by_units() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let sellers = reports
        .best_sellers(window(day(2024, 3, 1), day(2024, 3, 8)), 10)
        .await
        .unwrap();

    assert_eq!(sellers[0].product_id, "P1");
    assert_eq!(sellers[0].quantity_sold, 3);
    assert_eq!(sellers[0].orders, 2);
    assert_eq!(sellers[0].product_name.as_deref(), Some("RTX 4070"));
    assert_eq!(sellers.len(), 2);
}

#[tokio::test]
async fn category_shares_sum_to_one_hundred() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let categories = reports
        .revenue_by_category(window(day(2024, 3, 1), day(2024, 3, 8)))
        .await
        .unwrap();

    assert_eq!(categories[0].category, "GPU");
    let share: f64 = categories.iter().map(|c| c.share).sum();
    assert!((share - 100.0).abs() < 0.05);
}

#[tokio::test]
async fn discount_codes_are_grouped_case_insensitively() {
    let events = InMemoryEventStore::new();
    for (session, code, amount, total) in [("s1", "SALE10", 10.0, 90.0), ("s2", "sale10", 20.0, 180.0)] {
        events.seed(
            behavior(EventKind::DiscountUsage, session).data(json!({
                "discountCode": code,
                "discountAmount": amount,
                "orderTotal": total,
            })),
            at(2024, 3, 1, 10, 0, 0),
        );
    }

    let impact = facade(events, InMemoryCatalog::new())
        .discount_impact(window(day(2024, 3, 1), day(2024, 3, 3)))
        .await
        .unwrap();

    assert_eq!(impact.usage_count, 2);
    assert_eq!(impact.unique_codes, 1);
    assert_eq!(impact.codes[0].code, "SALE10");
    assert!((impact.total_discount - 30.0).abs() < f64::EPSILON);
    assert!((impact.discount_rate - 10.0).abs() < f64::EPSILON);
    assert_eq!(impact.daily.len(), 2);
}

#[tokio::test]
async fn order_summary_splits_by_lifecycle() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let summary = reports
        .order_summary(window(day(2024, 3, 1), day(2024, 3, 8)))
        .await
        .unwrap();

    assert_eq!(summary.total_orders, 4);
    assert_eq!(summary.completed_orders, 2);
    assert_eq!(summary.cancelled_orders, 1);
    assert_eq!(summary.pending_orders, 1);
    assert!((summary.completion_rate - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn stock_overview_flags_low_and_empty_stock() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let overview = reports.stock_overview(5).await.unwrap();

    assert_eq!(overview.product_count, 3);
    assert_eq!(overview.low_stock_count, 1);
    assert_eq!(overview.out_of_stock_count, 1);
    let low: Vec<&str> = overview.low_stock.iter().map(|i| i.product_id.as_str()).collect();
    assert_eq!(low, vec!["P2", "P1"]);
    assert!((overview.inventory_value - 1300.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn movement_separates_sold_and_idle_stock() {
    let reports = facade(InMemoryEventStore::new(), shop());
    let movement = reports
        .inventory_movement(window(day(2024, 3, 1), day(2024, 3, 8)), 10)
        .await
        .unwrap();

    assert_eq!(movement.fast_movers[0].product_id, "P1");
    assert!((movement.fast_movers[0].sell_through_rate - 50.0).abs() < f64::EPSILON);
    let idle: Vec<&str> = movement.slow_movers.iter().map(|m| m.product_id.as_str()).collect();
    assert_eq!(idle, vec!["P3"]);
}

#[tokio::test]
async fn store_failures_surface_as_typed_errors() {
    let events = InMemoryEventStore::new();
    events.fail_with("connection reset");

    let error = facade(events, InMemoryCatalog::new())
        .discount_impact(window(day(2024, 3, 1), day(2024, 3, 2)))
        .await
        .unwrap_err();

    assert!(matches!(error, AnalyticsError::Store(_)));
    assert!(!error.is_client_error());
}
