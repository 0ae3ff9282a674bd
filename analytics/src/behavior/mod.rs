//! User-behavior reports over the `behavior_events` table.
//!
//! A session is every event sharing a `sessionId` inside the report window.
//! Daily series attribute a session once, to the local day of its first event
//! in the window.
//!
//! Report families live in submodules, each adding methods to
//! [`BehaviorAnalytics`]:
//!
//! | Module | Reports |
//! |---|---|
//! | [`visitors`] | visitor overview, engagement |
//! | [`funnel`] | conversion funnel, weekly cohorts |
//! | [`products`] | most viewed products, cart abandonment |
//! | [`search`] | search insights |
//! | [`pages`] | devices, page performance, user journeys |
//! | [`pc_build`] | PC-build configurator insights |
//! | [`auth`] | login, logout and registration activity |

pub mod auth;
pub mod funnel;
pub mod pages;
pub mod pc_build;
pub mod products;
pub mod search;
pub mod visitors;

use std::collections::HashMap;
use std::sync::Arc;
use storefront_insights_core::classify::{DeviceClassifier, HeuristicClassifier, PageClassifier};
use storefront_insights_core::event::BehaviorEvent;
use storefront_insights_core::payload::EventPayload;
use storefront_insights_core::store::{BehaviorEventReader, CommerceCatalog, ProductRecord};

/// Behavior reports.
///
/// Page and device classification go through the injected classifiers, so
/// heuristics can change without touching the aggregations.
#[derive(Clone)]
pub struct BehaviorAnalytics {
    events: Arc<dyn BehaviorEventReader>,
    catalog: Arc<dyn CommerceCatalog>,
    pages: Arc<dyn PageClassifier>,
    devices: Arc<dyn DeviceClassifier>,
}

impl BehaviorAnalytics {
    /// Create the service with the default heuristic classifiers.
    #[must_use]
    pub fn new(events: Arc<dyn BehaviorEventReader>, catalog: Arc<dyn CommerceCatalog>) -> Self {
        Self {
            events,
            catalog,
            pages: Arc::new(HeuristicClassifier),
            devices: Arc::new(HeuristicClassifier),
        }
    }

    /// Replace the page and device classifiers.
    #[must_use]
    pub fn with_classifiers(
        mut self,
        pages: Arc<dyn PageClassifier>,
        devices: Arc<dyn DeviceClassifier>,
    ) -> Self {
        self.pages = pages;
        self.devices = devices;
        self
    }

    /// Catalog records for `ids`, keyed by the id as requested.
    ///
    /// Each id is looked up on its own; a failed lookup (for example an id the
    /// catalog cannot parse) is logged and leaves that product unenriched.
    async fn catalog_products(&self, ids: &[String]) -> HashMap<String, ProductRecord> {
        let lookups = ids.iter().map(|id| async move {
            (id.clone(), self.catalog.products_by_ids(vec![id.clone()]).await)
        });

        let mut found = HashMap::new();
        for (id, result) in futures::future::join_all(lookups).await {
            match result {
                Ok(products) => {
                    if let Some(product) = products.into_iter().next() {
                        found.insert(id, product);
                    }
                },
                Err(error) => {
                    tracing::warn!(product_id = %id, error = %error, "Skipping product enrichment");
                },
            }
        }
        found
    }
}

/// The typed payload of `event`, or `None` (logged) if it does not match its schema.
fn payload(event: &BehaviorEvent) -> Option<EventPayload> {
    match event.payload() {
        Ok(payload) => Some(payload),
        Err(error) => {
            tracing::warn!(
                event_id = event.id,
                event_type = %event.event_type,
                error = %error,
                "Skipping event with malformed payload"
            );
            None
        },
    }
}
