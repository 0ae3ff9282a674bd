//! Product attention and cart abandonment.

use super::{payload, BehaviorAnalytics};
use crate::tally::{rank_desc, Tally};
use crate::{observe, AnalyticsError, DECIMALS};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use storefront_insights_core::coerce::{count_f64, percentage, round_to};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::payload::EventPayload;
use storefront_insights_core::store::EventQuery;
use storefront_insights_core::time::ReportWindow;

/// A product ranked by detail-page views.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewedProduct {
    /// Product id.
    pub product_id: String,
    /// Catalog name, else the name seen on the events.
    pub product_name: Option<String>,
    /// Catalog category.
    pub category: Option<String>,
    /// `product_viewed` events.
    pub views: u64,
    /// Distinct sessions that viewed it.
    pub unique_viewers: u64,
    /// Units ordered in `order_created` events.
    pub purchases: u64,
    /// `100 * purchases / views`.
    pub conversion_rate: f64,
}

#[derive(Default)]
struct ViewTally {
    name: Option<String>,
    views: u64,
    sessions: HashSet<String>,
}

/// A product left in carts that never turned into an order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedProduct {
    /// Product id.
    pub product_id: String,
    /// Name seen on the cart events.
    pub product_name: Option<String>,
    /// Abandoned sessions that added it.
    pub sessions: u64,
    /// Units added in those sessions.
    pub quantity: u64,
    /// `sum(price * quantity)` of those additions.
    pub value: f64,
}

/// Cart abandonment.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAbandonment {
    /// Sessions with at least one add-to-cart.
    pub cart_sessions: u64,
    /// Of those, sessions that also created an order.
    pub converted_sessions: u64,
    /// Of those, sessions that did not.
    pub abandoned_sessions: u64,
    /// `100 * abandoned / cart sessions`.
    pub abandonment_rate: f64,
    /// Value of everything added in abandoned sessions.
    pub abandoned_value: f64,
    /// Most abandoned first.
    pub top_abandoned_products: Vec<AbandonedProduct>,
}

#[derive(Default)]
struct AbandonedTally {
    name: Option<String>,
    sessions: HashSet<String>,
    quantity: u64,
    value: f64,
}

impl BehaviorAnalytics {
    /// Products ranked by views, with purchases and view-to-purchase conversion.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn most_viewed_products(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<Vec<ViewedProduct>, AnalyticsError> {
        observe("behavior.most_viewed_products", async {
            let events = self
                .events
                .events(EventQuery::of(
                    window,
                    [EventKind::ProductViewed, EventKind::OrderCreated],
                ))
                .await?;

            let mut views: Tally<String, ViewTally> = Tally::new();
            let mut purchases: HashMap<String, u64> = HashMap::new();
            for event in &events {
                match event.event_type {
                    EventKind::ProductViewed => {
                        let Some(product_id) = event.product_id() else {
                            continue;
                        };
                        let tally = views.entry(product_id);
                        tally.views += 1;
                        tally.sessions.insert(event.session_id.clone());
                        if tally.name.is_none() {
                            if let Some(EventPayload::ProductView(product)) = payload(event) {
                                tally.name = product.product_name;
                            }
                        }
                    },
                    EventKind::OrderCreated => {
                        if let Some(EventPayload::Order(order)) = payload(event) {
                            for item in order.items {
                                if let Some(product_id) = item.product_id {
                                    *purchases.entry(product_id).or_default() += item.quantity;
                                }
                            }
                        }
                    },
                    _ => {},
                }
            }

            let mut rows: Vec<ViewedProduct> = views
                .into_vec()
                .into_iter()
                .map(|(product_id, tally)| {
                    let bought = purchases.get(&product_id).copied().unwrap_or(0);
                    ViewedProduct {
                        product_name: tally.name,
                        category: None,
                        views: tally.views,
                        unique_viewers: tally.sessions.len() as u64,
                        purchases: bought,
                        conversion_rate: percentage(
                            count_f64(bought),
                            count_f64(tally.views),
                            DECIMALS,
                        ),
                        product_id,
                    }
                })
                .collect();
            rank_desc(&mut rows, limit, |row| count_f64(row.views));

            let ids: Vec<String> = rows.iter().map(|row| row.product_id.clone()).collect();
            let catalog = self.catalog_products(&ids).await;
            for row in &mut rows {
                if let Some(product) = catalog.get(&row.product_id) {
                    row.product_name = Some(product.name.clone());
                    row.category.clone_from(&product.category);
                }
            }
            Ok(rows)
        })
        .await
    }

    /// Sessions that added to cart without ordering, and what they left behind.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn cart_abandonment(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<CartAbandonment, AnalyticsError> {
        observe("behavior.cart_abandonment", async {
            let events = self
                .events
                .events(EventQuery::of(
                    window,
                    [EventKind::ProductAddedToCart, EventKind::OrderCreated],
                ))
                .await?;

            let ordered: HashSet<&str> = events
                .iter()
                .filter(|e| e.event_type == EventKind::OrderCreated)
                .map(|e| e.session_id.as_str())
                .collect();

            let mut cart_sessions: HashSet<&str> = HashSet::new();
            let mut abandoned: Tally<String, AbandonedTally> = Tally::new();
            let mut abandoned_value = 0.0;
            for event in events
                .iter()
                .filter(|e| e.event_type == EventKind::ProductAddedToCart)
            {
                let session = event.session_id.as_str();
                cart_sessions.insert(session);
                if ordered.contains(session) {
                    continue;
                }
                let Some(EventPayload::Cart(item)) = payload(event) else {
                    continue;
                };
                let Some(product_id) = item.product_id.clone().or_else(|| event.product_id())
                else {
                    continue;
                };
                let value = item.price * count_f64(item.quantity);
                abandoned_value += value;

                let tally = abandoned.entry(product_id);
                if tally.name.is_none() {
                    tally.name = item.product_name;
                }
                tally.sessions.insert(session.to_string());
                tally.quantity += item.quantity;
                tally.value += value;
            }

            let converted = cart_sessions
                .iter()
                .filter(|session| ordered.contains(*session))
                .count() as u64;
            let total = cart_sessions.len() as u64;

            let mut top: Vec<AbandonedProduct> = abandoned
                .into_vec()
                .into_iter()
                .map(|(product_id, tally)| AbandonedProduct {
                    product_id,
                    product_name: tally.name,
                    sessions: tally.sessions.len() as u64,
                    quantity: tally.quantity,
                    value: round_to(tally.value, DECIMALS),
                })
                .collect();
            rank_desc(&mut top, limit, |row| count_f64(row.sessions));

            Ok(CartAbandonment {
                cart_sessions: total,
                converted_sessions: converted,
                abandoned_sessions: total - converted,
                abandonment_rate: percentage(
                    count_f64(total - converted),
                    count_f64(total),
                    DECIMALS,
                ),
                abandoned_value: round_to(abandoned_value, DECIMALS),
                top_abandoned_products: top,
            })
        })
        .await
    }
}
