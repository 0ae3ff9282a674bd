//! Behavior events: the tagged event kind, the queue envelope and the persisted row.
//!
//! Every user interaction the storefront reports travels through three shapes:
//!
//! ```text
//! TrackedEvent (HTTP / queue JSON)  →  NewBehaviorEvent (insert)  →  BehaviorEvent (row)
//! ```
//!
//! The `eventType` tag on the wire is an open string. Inside the workspace it is
//! an [`EventKind`]: a closed enum over every tag the storefront emits plus an
//! [`EventKind::Unknown`] variant, so dispatchers can `match` exhaustively and
//! still tolerate producers that are newer than the consumer.
//!
//! # Example
//!
//! ```
//! use storefront_insights_core::event::EventKind;
//!
//! assert_eq!(EventKind::parse("product_viewed"), EventKind::ProductViewed);
//! assert_eq!(EventKind::parse("wishlist_added"), EventKind::Unknown("wishlist_added".into()));
//! assert!(EventKind::ProductAddedToCart.is_meaningful_interaction());
//! ```

use crate::payload::{EventPayload, PayloadError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The semantic tag of a behavior event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Generic page view.
    PageView,
    /// A category listing was opened.
    CategoryViewed,
    /// A product detail page was viewed.
    ProductViewed,
    /// A product tile was clicked.
    ProductClick,
    /// A product was added to the cart.
    ProductAddedToCart,
    /// A product was removed from the cart.
    ProductRemovedFromCart,
    /// The checkout flow was opened.
    CheckoutStarted,
    /// An order was placed.
    OrderCreated,
    /// An order was cancelled by the customer.
    OrderCancelled,
    /// A payment succeeded.
    PaymentCompleted,
    /// A catalog search was run.
    Search,
    /// A browsing session started.
    SessionStart,
    /// A browsing session ended.
    SessionEnd,
    /// A customer signed in.
    UserAuthenticated,
    /// A customer signed out.
    UserLogout,
    /// A customer created an account.
    UserRegistered,
    /// A discount code was applied.
    DiscountUsage,
    /// A free-text "build me a PC" request.
    AutoBuildPcRequest,
    /// An automatically generated build was added to the cart.
    AutoBuildPcAddToCart,
    /// A component was picked in the manual PC builder.
    ManualBuildPcComponentSelect,
    /// A component was removed in the manual PC builder.
    ManualBuildPcComponentRemove,
    /// A manual build was added to the cart.
    ManualBuildPcAddToCart,
    /// Any tag this build does not know about.
    Unknown(String),
}

impl EventKind {
    /// Every known kind, in declaration order.
    pub const KNOWN: [Self; 22] = [
        Self::PageView,
        Self::CategoryViewed,
        Self::ProductViewed,
        Self::ProductClick,
        Self::ProductAddedToCart,
        Self::ProductRemovedFromCart,
        Self::CheckoutStarted,
        Self::OrderCreated,
        Self::OrderCancelled,
        Self::PaymentCompleted,
        Self::Search,
        Self::SessionStart,
        Self::SessionEnd,
        Self::UserAuthenticated,
        Self::UserLogout,
        Self::UserRegistered,
        Self::DiscountUsage,
        Self::AutoBuildPcRequest,
        Self::AutoBuildPcAddToCart,
        Self::ManualBuildPcComponentSelect,
        Self::ManualBuildPcComponentRemove,
        Self::ManualBuildPcAddToCart,
    ];

    /// Parse a wire tag. Never fails: unrecognised tags become [`EventKind::Unknown`].
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "page_view" => Self::PageView,
            "category_viewed" => Self::CategoryViewed,
            "product_viewed" => Self::ProductViewed,
            "product_click" => Self::ProductClick,
            "product_added_to_cart" => Self::ProductAddedToCart,
            "product_removed_from_cart" => Self::ProductRemovedFromCart,
            "checkout_started" => Self::CheckoutStarted,
            "order_created" => Self::OrderCreated,
            "order_cancelled" => Self::OrderCancelled,
            "payment_completed" => Self::PaymentCompleted,
            "search" => Self::Search,
            "session_start" => Self::SessionStart,
            "session_end" => Self::SessionEnd,
            "user_authenticated" => Self::UserAuthenticated,
            "user_logout" => Self::UserLogout,
            "user_registered" => Self::UserRegistered,
            "discount_usage" => Self::DiscountUsage,
            "auto_build_pc_request" => Self::AutoBuildPcRequest,
            "auto_build_pc_add_to_cart" => Self::AutoBuildPcAddToCart,
            "manual_build_pc_component_select" => Self::ManualBuildPcComponentSelect,
            "manual_build_pc_component_remove" => Self::ManualBuildPcComponentRemove,
            "manual_build_pc_add_to_cart" => Self::ManualBuildPcAddToCart,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire/storage tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PageView => "page_view",
            Self::CategoryViewed => "category_viewed",
            Self::ProductViewed => "product_viewed",
            Self::ProductClick => "product_click",
            Self::ProductAddedToCart => "product_added_to_cart",
            Self::ProductRemovedFromCart => "product_removed_from_cart",
            Self::CheckoutStarted => "checkout_started",
            Self::OrderCreated => "order_created",
            Self::OrderCancelled => "order_cancelled",
            Self::PaymentCompleted => "payment_completed",
            Self::Search => "search",
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::UserAuthenticated => "user_authenticated",
            Self::UserLogout => "user_logout",
            Self::UserRegistered => "user_registered",
            Self::DiscountUsage => "discount_usage",
            Self::AutoBuildPcRequest => "auto_build_pc_request",
            Self::AutoBuildPcAddToCart => "auto_build_pc_add_to_cart",
            Self::ManualBuildPcComponentSelect => "manual_build_pc_component_select",
            Self::ManualBuildPcComponentRemove => "manual_build_pc_component_remove",
            Self::ManualBuildPcAddToCart => "manual_build_pc_add_to_cart",
            Self::Unknown(tag) => tag,
        }
    }

    /// Interactions that count towards engagement (view, click, add-to-cart, order, payment).
    #[must_use]
    pub const fn is_meaningful_interaction(&self) -> bool {
        matches!(
            self,
            Self::ProductViewed
                | Self::ProductClick
                | Self::ProductAddedToCart
                | Self::OrderCreated
                | Self::PaymentCompleted
        )
    }

    /// Kinds that travel on the authentication topic.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::UserAuthenticated | Self::UserLogout | Self::UserRegistered
        )
    }

    /// Kinds emitted by the PC-build configurator.
    #[must_use]
    pub const fn is_pc_build(&self) -> bool {
        matches!(
            self,
            Self::AutoBuildPcRequest
                | Self::AutoBuildPcAddToCart
                | Self::ManualBuildPcComponentSelect
                | Self::ManualBuildPcComponentRemove
                | Self::ManualBuildPcAddToCart
        )
    }

    /// Meaningful interaction kinds as storage tags.
    #[must_use]
    pub fn meaningful_tags() -> Vec<String> {
        Self::KNOWN
            .iter()
            .filter(|kind| kind.is_meaningful_interaction())
            .map(|kind| kind.as_str().to_string())
            .collect()
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope validation failures, reported at the ingestion boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A field is present but out of range or malformed.
    #[error("{field} is invalid: {reason}")]
    InvalidField {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// `eventData` does not match the schema of its event kind.
    #[error("eventData is invalid: {0}")]
    Payload(#[from] PayloadError),
}

/// The generic tracking envelope carried by HTTP requests and queue messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEvent {
    /// Event tag.
    pub event_type: EventKind,
    /// Browsing session key.
    #[serde(default)]
    pub session_id: String,
    /// Authenticated customer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    /// Subject of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Kind of subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// Page the event fired on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    /// Referring page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_url: Option<String>,
    /// Client device description (user agent, screen, viewport, language).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<serde_json::Value>,
    /// Kind-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,
    /// Caller network address, stamped by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl TrackedEvent {
    /// A bare envelope for `kind` in `session_id`.
    #[must_use]
    pub fn new(kind: EventKind, session_id: impl Into<String>) -> Self {
        Self {
            event_type: kind,
            session_id: session_id.into(),
            customer_id: None,
            entity_id: None,
            entity_type: None,
            page_url: None,
            referrer_url: None,
            device_info: None,
            event_data: None,
            ip_address: None,
        }
    }

    /// Check the envelope before it is enqueued.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the type or session is blank, the customer
    /// id is not positive, or `eventData` does not fit the schema of a known kind.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_type.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("eventType"));
        }
        if self.session_id.trim().is_empty() {
            return Err(ValidationError::MissingField("sessionId"));
        }
        if let Some(customer_id) = self.customer_id {
            if customer_id <= 0 {
                return Err(ValidationError::InvalidField {
                    field: "customerId",
                    reason: format!("must be positive, got {customer_id}"),
                });
            }
        }
        if let Some(device_info) = &self.device_info {
            if !device_info.is_object() {
                return Err(ValidationError::InvalidField {
                    field: "deviceInfo",
                    reason: "must be a JSON object".to_string(),
                });
            }
        }
        EventPayload::parse(&self.event_type, self.event_data.as_ref())?;
        Ok(())
    }

    /// The typed payload, if `eventData` fits the kind's schema.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the payload shape does not match.
    pub fn payload(&self) -> Result<EventPayload, PayloadError> {
        EventPayload::parse(&self.event_type, self.event_data.as_ref())
    }

    /// A string field of `eventData`, accepting numeric ids as well.
    ///
    /// `key` is the camelCase name; its snake_case spelling is read as a fallback.
    #[must_use]
    pub fn data_field(&self, key: &str) -> Option<String> {
        data_field(self.event_data.as_ref(), key)
    }
}

/// Reads `key` (camelCase) or its snake_case alias from a payload as a trimmed id.
fn data_field(data: Option<&serde_json::Value>, key: &str) -> Option<String> {
    let data = data?;
    data.get(key)
        .and_then(id_text)
        .or_else(|| data.get(snake_case(key).as_str()).and_then(id_text))
}

fn id_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// A behavior event ready to be inserted; ids and `created_at` are assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBehaviorEvent {
    /// Authenticated customer, if any.
    pub customer_id: Option<i64>,
    /// Browsing session key.
    pub session_id: String,
    /// Event tag.
    pub event_type: EventKind,
    /// Subject of the event.
    pub entity_id: Option<String>,
    /// Kind of subject.
    pub entity_type: Option<String>,
    /// Page the event fired on.
    pub page_url: Option<String>,
    /// Referring page.
    pub referrer_url: Option<String>,
    /// Client device description.
    pub device_info: Option<serde_json::Value>,
    /// Kind-specific payload.
    pub event_data: Option<serde_json::Value>,
    /// Caller network address.
    pub ip_address: Option<String>,
}

impl NewBehaviorEvent {
    /// Copy the envelope fields; entity fields are filled by the caller.
    #[must_use]
    pub fn from_tracked(event: TrackedEvent) -> Self {
        Self {
            customer_id: event.customer_id,
            session_id: event.session_id,
            event_type: event.event_type,
            entity_id: event.entity_id,
            entity_type: event.entity_type,
            page_url: event.page_url,
            referrer_url: event.referrer_url,
            device_info: event.device_info,
            event_data: event.event_data,
            ip_address: event.ip_address,
        }
    }

    /// Set the subject of the event.
    #[must_use]
    pub fn with_entity(mut self, entity_id: Option<String>, entity_type: Option<String>) -> Self {
        self.entity_id = entity_id;
        self.entity_type = entity_type;
        self
    }

    /// Materialise the row with store-assigned identity and timestamp.
    #[must_use]
    pub fn into_event(self, id: i64, event_id: Uuid, created_at: DateTime<Utc>) -> BehaviorEvent {
        BehaviorEvent {
            id,
            event_id,
            customer_id: self.customer_id,
            session_id: self.session_id,
            event_type: self.event_type,
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            page_url: self.page_url,
            referrer_url: self.referrer_url,
            device_info: self.device_info,
            event_data: self.event_data,
            ip_address: self.ip_address,
            created_at,
        }
    }
}

/// A persisted behavior event. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorEvent {
    /// Generated numeric id.
    pub id: i64,
    /// Generated UUID.
    pub event_id: Uuid,
    /// Authenticated customer, if any.
    pub customer_id: Option<i64>,
    /// Browsing session key.
    pub session_id: String,
    /// Event tag.
    pub event_type: EventKind,
    /// Subject of the event.
    pub entity_id: Option<String>,
    /// Kind of subject.
    pub entity_type: Option<String>,
    /// Page the event fired on.
    pub page_url: Option<String>,
    /// Referring page.
    pub referrer_url: Option<String>,
    /// Client device description.
    pub device_info: Option<serde_json::Value>,
    /// Kind-specific payload.
    pub event_data: Option<serde_json::Value>,
    /// Caller network address.
    pub ip_address: Option<String>,
    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
}

impl BehaviorEvent {
    /// The typed payload of this row.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the stored payload does not fit the schema.
    pub fn payload(&self) -> Result<EventPayload, PayloadError> {
        EventPayload::parse(&self.event_type, self.event_data.as_ref())
    }

    /// The product this event refers to: `entityId`, else `eventData.productId`
    /// (or `product_id`).
    #[must_use]
    pub fn product_id(&self) -> Option<String> {
        self.entity_id
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| id.trim().to_string())
            .or_else(|| data_field(self.event_data.as_ref(), "productId"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_known_kind_round_trips_through_its_tag() {
        for kind in EventKind::KNOWN {
            assert_eq!(EventKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let kind = EventKind::parse("wishlist_added");
        assert_eq!(kind, EventKind::Unknown("wishlist_added".to_string()));
        assert_eq!(kind.as_str(), "wishlist_added");
    }

    #[test]
    fn meaningful_tags_cover_five_interactions() {
        let tags = EventKind::meaningful_tags();
        assert_eq!(tags.len(), 5);
        assert!(tags.contains(&"product_viewed".to_string()));
        assert!(!tags.contains(&"search".to_string()));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn envelope_deserializes_camel_case() {
        let event: TrackedEvent = serde_json::from_value(json!({
            "eventType": "search",
            "sessionId": "s-1",
            "customerId": 7,
            "eventData": { "query": "rtx 4070", "resultsCount": 12 }
        }))
        .unwrap();

        assert_eq!(event.event_type, EventKind::Search);
        assert_eq!(event.customer_id, Some(7));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn validation_requires_session() {
        let event = TrackedEvent::new(EventKind::PageView, "  ");
        assert_eq!(
            event.validate(),
            Err(ValidationError::MissingField("sessionId"))
        );
    }

    #[test]
    fn validation_rejects_payload_shape_mismatch() {
        let mut event = TrackedEvent::new(EventKind::Search, "s-1");
        event.event_data = Some(json!({ "resultsCount": 3 }));
        assert!(matches!(event.validate(), Err(ValidationError::Payload(_))));
    }

    #[test]
    fn validation_rejects_non_object_device_info() {
        let mut event = TrackedEvent::new(EventKind::PageView, "s-1");
        event.device_info = Some(json!("Mozilla/5.0"));
        assert!(matches!(
            event.validate(),
            Err(ValidationError::InvalidField { field: "deviceInfo", .. })
        ));
    }

    #[test]
    fn product_id_prefers_entity_then_payload() {
        let row = NewBehaviorEvent::from_tracked(TrackedEvent {
            event_data: Some(json!({ "productId": 42 })),
            ..TrackedEvent::new(EventKind::ProductViewed, "s-1")
        })
        .into_event(1, Uuid::nil(), Utc::now());
        assert_eq!(row.product_id().as_deref(), Some("42"));

        let row = BehaviorEvent {
            entity_id: Some("p-9".to_string()),
            ..row
        };
        assert_eq!(row.product_id().as_deref(), Some("p-9"));
    }

    #[test]
    fn data_fields_accept_snake_case_keys() {
        let event = TrackedEvent {
            event_data: Some(json!({ "order_id": "O-7", "discount_code": " SALE10 " })),
            ..TrackedEvent::new(EventKind::OrderCreated, "s-1")
        };
        assert_eq!(event.data_field("orderId").as_deref(), Some("O-7"));
        assert_eq!(event.data_field("discountCode").as_deref(), Some("SALE10"));
        assert_eq!(event.data_field("productId"), None);

        let row = NewBehaviorEvent::from_tracked(TrackedEvent {
            event_data: Some(json!({ "product_id": "P1" })),
            ..TrackedEvent::new(EventKind::ProductViewed, "s-1")
        })
        .into_event(1, Uuid::nil(), Utc::now());
        assert_eq!(row.product_id().as_deref(), Some("P1"));
    }

    #[test]
    fn camel_case_key_wins_over_alias() {
        let event = TrackedEvent {
            event_data: Some(json!({ "productId": "camel", "product_id": "snake" })),
            ..TrackedEvent::new(EventKind::ProductClick, "s-1")
        };
        assert_eq!(event.data_field("productId").as_deref(), Some("camel"));
    }
}
