//! Event dispatch: one queue message becomes one `behavior_events` row.
//!
//! The dispatcher parses the envelope, matches exhaustively on its
//! [`EventKind`] and hands it to the handler for that kind. Each handler
//! decides the row's subject (`entityId` / `entityType`):
//!
//! | Kinds | entityId | entityType |
//! |---|---|---|
//! | product views, clicks, cart changes | explicit, else `eventData.productId` | `product` |
//! | order and payment events | explicit, else `eventData.orderId` | `order` |
//! | session start/end | the session id | `session` |
//! | sign-in, sign-out, registration | explicit, else the customer id | `user` |
//! | discount usage | explicit, else `eventData.discountCode` | `discount` |
//! | PC-builder events | explicit, else `eventData.productId` | `pc_build` |
//! | search | explicit only | `search` |
//! | page, category, checkout | explicit only | `page`, `category`, `cart` |
//!
//! An explicit `entityType` on the envelope wins over the defaults above,
//! except for searches. Malformed JSON and unknown event types are logged and
//! dropped. A product view by a signed-in customer also upserts the
//! recently-viewed record; a failure there is logged and does not fail the
//! event write.

use super::handlers::{EventHandler, HandlerError};
use async_trait::async_trait;
use std::sync::Arc;
use storefront_insights_core::event::{BehaviorEvent, EventKind, NewBehaviorEvent, TrackedEvent};
use storefront_insights_core::store::{BehaviorEventWriter, StoreError};
use tracing::{debug, warn};

/// Why a message produced no row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The body is not a tracking envelope.
    Malformed,
    /// The event type is not one this build handles.
    UnknownType,
}

impl DropReason {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownType => "unknown_type",
        }
    }
}

/// Outcome of dispatching one message.
#[derive(Clone, Debug)]
pub enum Dispatch {
    /// The row that was written.
    Persisted(BehaviorEvent),
    /// Nothing was written.
    Dropped(DropReason),
}

/// Routes tracking envelopes to per-kind handlers that write behavior events.
#[derive(Clone)]
pub struct BehaviorEventDispatcher {
    writer: Arc<dyn BehaviorEventWriter>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn explicit_entity(event: &TrackedEvent) -> Option<String> {
    non_blank(event.entity_id.as_deref())
}

fn entity_or_field(event: &TrackedEvent, key: &str) -> Option<String> {
    explicit_entity(event).or_else(|| event.data_field(key))
}

fn entity_type(event: &TrackedEvent, default: &str) -> String {
    non_blank(event.entity_type.as_deref()).unwrap_or_else(|| default.to_string())
}

impl BehaviorEventDispatcher {
    /// Dispatcher writing through `writer`.
    #[must_use]
    pub fn new(writer: Arc<dyn BehaviorEventWriter>) -> Self {
        Self { writer }
    }

    /// Parse and dispatch one raw message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the event write fails. Malformed bodies are
    /// not errors; they come back as [`Dispatch::Dropped`].
    pub async fn dispatch_bytes(&self, data: &[u8]) -> Result<Dispatch, StoreError> {
        metrics::counter!("ingest.events.received").increment(1);

        let event: TrackedEvent = match serde_json::from_slice(data) {
            Ok(event) => event,
            Err(error) => {
                warn!(error = %error, bytes = data.len(), "Dropping malformed event message");
                return Ok(Self::dropped(DropReason::Malformed));
            },
        };
        if event.session_id.trim().is_empty() {
            warn!(event_type = %event.event_type, "Dropping event without sessionId");
            return Ok(Self::dropped(DropReason::Malformed));
        }

        self.dispatch(event).await
    }

    /// Dispatch one parsed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the event write fails.
    pub async fn dispatch(&self, event: TrackedEvent) -> Result<Dispatch, StoreError> {
        let kind = event.event_type.clone();

        let stored = match kind {
            EventKind::PageView => self.on_page_view(event).await,
            EventKind::CategoryViewed => self.on_category_viewed(event).await,
            EventKind::ProductViewed => self.on_product_viewed(event).await,
            EventKind::ProductClick => self.on_product_click(event).await,
            EventKind::ProductAddedToCart => self.on_product_added_to_cart(event).await,
            EventKind::ProductRemovedFromCart => self.on_product_removed_from_cart(event).await,
            EventKind::CheckoutStarted => self.on_checkout_started(event).await,
            EventKind::OrderCreated => self.on_order_created(event).await,
            EventKind::OrderCancelled => self.on_order_cancelled(event).await,
            EventKind::PaymentCompleted => self.on_payment_completed(event).await,
            EventKind::Search => self.on_search(event).await,
            EventKind::SessionStart => self.on_session_start(event).await,
            EventKind::SessionEnd => self.on_session_end(event).await,
            EventKind::UserAuthenticated => self.on_user_authenticated(event).await,
            EventKind::UserLogout => self.on_user_logout(event).await,
            EventKind::UserRegistered => self.on_user_registered(event).await,
            EventKind::DiscountUsage => self.on_discount_usage(event).await,
            EventKind::AutoBuildPcRequest => self.on_auto_build_pc_request(event).await,
            EventKind::AutoBuildPcAddToCart => self.on_auto_build_pc_add_to_cart(event).await,
            EventKind::ManualBuildPcComponentSelect => self.on_manual_component_select(event).await,
            EventKind::ManualBuildPcComponentRemove => self.on_manual_component_remove(event).await,
            EventKind::ManualBuildPcAddToCart => self.on_manual_build_pc_add_to_cart(event).await,
            EventKind::Unknown(tag) => {
                warn!(event_type = %tag, session_id = %event.session_id, "Dropping event of unknown type");
                return Ok(Self::dropped(DropReason::UnknownType));
            },
        }?;

        metrics::counter!("ingest.events.persisted", "event_type" => stored.event_type.as_str().to_string())
            .increment(1);
        debug!(
            id = stored.id,
            event_type = %stored.event_type,
            session_id = %stored.session_id,
            "Event persisted"
        );
        Ok(Dispatch::Persisted(stored))
    }

    fn dropped(reason: DropReason) -> Dispatch {
        metrics::counter!("ingest.events.dropped", "reason" => reason.as_str()).increment(1);
        Dispatch::Dropped(reason)
    }

    async fn persist(
        &self,
        event: TrackedEvent,
        entity_id: Option<String>,
        entity_type: String,
    ) -> Result<BehaviorEvent, StoreError> {
        let row = NewBehaviorEvent::from_tracked(event).with_entity(entity_id, Some(entity_type));
        self.writer.insert(row).await
    }

    async fn persist_as(
        &self,
        event: TrackedEvent,
        entity_id: Option<String>,
        default_type: &str,
    ) -> Result<BehaviorEvent, StoreError> {
        let entity_type = entity_type(&event, default_type);
        self.persist(event, entity_id, entity_type).await
    }

    // Navigation

    async fn on_page_view(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = explicit_entity(&event);
        self.persist_as(event, entity, "page").await
    }

    async fn on_category_viewed(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = explicit_entity(&event);
        self.persist_as(event, entity, "category").await
    }

    async fn on_checkout_started(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = explicit_entity(&event);
        self.persist_as(event, entity, "cart").await
    }

    async fn on_search(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = explicit_entity(&event);
        self.persist(event, entity, "search".to_string()).await
    }

    // Products

    async fn on_product_viewed(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let customer_id = event.customer_id;
        let product_id = entity_or_field(&event, "productId");
        let stored = self.persist_as(event, product_id.clone(), "product").await?;

        if let (Some(customer_id), Some(product_id)) = (customer_id, product_id) {
            if let Err(error) = self
                .writer
                .record_viewed_product(customer_id, product_id.clone())
                .await
            {
                warn!(
                    customer_id,
                    product_id = %product_id,
                    error = %error,
                    "Failed to record viewed product"
                );
            }
        }
        Ok(stored)
    }

    async fn on_product_click(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "product").await
    }

    async fn on_product_added_to_cart(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "product").await
    }

    async fn on_product_removed_from_cart(
        &self,
        event: TrackedEvent,
    ) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "product").await
    }

    // Orders and payments

    async fn on_order_created(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "orderId");
        self.persist_as(event, entity, "order").await
    }

    async fn on_order_cancelled(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "orderId");
        self.persist_as(event, entity, "order").await
    }

    async fn on_payment_completed(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "orderId");
        self.persist_as(event, entity, "order").await
    }

    async fn on_discount_usage(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "discountCode");
        self.persist_as(event, entity, "discount").await
    }

    // Sessions and identity

    async fn on_session_start(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = Some(event.session_id.clone());
        self.persist_as(event, entity, "session").await
    }

    async fn on_session_end(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = Some(event.session_id.clone());
        self.persist_as(event, entity, "session").await
    }

    fn user_entity(event: &TrackedEvent) -> Option<String> {
        explicit_entity(event).or_else(|| event.customer_id.map(|id| id.to_string()))
    }

    async fn on_user_authenticated(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = Self::user_entity(&event);
        self.persist_as(event, entity, "user").await
    }

    async fn on_user_logout(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = Self::user_entity(&event);
        self.persist_as(event, entity, "user").await
    }

    async fn on_user_registered(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = Self::user_entity(&event);
        self.persist_as(event, entity, "user").await
    }

    // PC builder

    async fn on_auto_build_pc_request(&self, event: TrackedEvent) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "pc_build").await
    }

    async fn on_auto_build_pc_add_to_cart(
        &self,
        event: TrackedEvent,
    ) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "pc_build").await
    }

    async fn on_manual_component_select(
        &self,
        event: TrackedEvent,
    ) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "pc_build").await
    }

    async fn on_manual_component_remove(
        &self,
        event: TrackedEvent,
    ) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "pc_build").await
    }

    async fn on_manual_build_pc_add_to_cart(
        &self,
        event: TrackedEvent,
    ) -> Result<BehaviorEvent, StoreError> {
        let entity = entity_or_field(&event, "productId");
        self.persist_as(event, entity, "pc_build").await
    }
}

#[async_trait]
impl EventHandler for BehaviorEventDispatcher {
    async fn handle(&self, data: &[u8]) -> Result<(), HandlerError> {
        self.dispatch_bytes(data).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_entity_wins_over_payload() {
        let mut event = TrackedEvent::new(EventKind::OrderCreated, "s-1");
        event.event_data = Some(json!({ "orderId": "O-2" }));
        assert_eq!(entity_or_field(&event, "orderId").as_deref(), Some("O-2"));

        event.entity_id = Some("O-1".to_string());
        assert_eq!(entity_or_field(&event, "orderId").as_deref(), Some("O-1"));
    }

    #[test]
    fn test_blank_entity_falls_back() {
        let mut event = TrackedEvent::new(EventKind::ProductClick, "s-1");
        event.entity_id = Some("  ".to_string());
        event.event_data = Some(json!({ "productId": 42 }));

        assert_eq!(entity_or_field(&event, "productId").as_deref(), Some("42"));
    }

    #[test]
    fn test_entity_type_default_and_override() {
        let mut event = TrackedEvent::new(EventKind::PageView, "s-1");
        assert_eq!(entity_type(&event, "page"), "page");

        event.entity_type = Some("landing".to_string());
        assert_eq!(entity_type(&event, "page"), "landing");
    }

    #[test]
    fn test_user_entity_from_customer() {
        let mut event = TrackedEvent::new(EventKind::UserAuthenticated, "s-1");
        event.customer_id = Some(9);

        assert_eq!(BehaviorEventDispatcher::user_entity(&event).as_deref(), Some("9"));
    }
}
