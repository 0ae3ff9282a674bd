//! Structured `eventData` schemas, one per event family.
//!
//! Producers send camelCase keys; snake_case aliases are accepted too. Numeric
//! fields take JSON numbers or numeric strings and fall back to zero; identifiers
//! take strings or numbers. Only genuinely required fields (a search query, a
//! discount code, a component type) make parsing fail.

use crate::coerce::{coerce_f64, coerce_u64};
use crate::event::EventKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Payload parsing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// `eventData` is present but is not a JSON object.
    #[error("{kind} payload must be a JSON object")]
    NotAnObject {
        /// Event tag.
        kind: String,
    },

    /// The object does not match the schema (missing required key, wrong nesting).
    #[error("{kind} payload: {reason}")]
    Invalid {
        /// Event tag.
        kind: String,
        /// Decoder message.
        reason: String,
    },

    /// A required text field is blank.
    #[error("{kind} payload: {field} must not be empty")]
    EmptyField {
        /// Event tag.
        kind: String,
        /// Field name on the wire.
        field: &'static str,
    },
}

/// Product views and clicks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    /// Product identifier.
    #[serde(default, alias = "product_id", deserialize_with = "lenient_id")]
    pub product_id: Option<String>,
    /// Display name at event time.
    #[serde(default, alias = "product_name", deserialize_with = "lenient_id")]
    pub product_name: Option<String>,
    /// Category label at event time.
    #[serde(default, deserialize_with = "lenient_id")]
    pub category: Option<String>,
    /// Unit price.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    /// Position in a listing (clicks).
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub position: Option<u64>,
    /// Listing the click came from (clicks).
    #[serde(default, deserialize_with = "lenient_id")]
    pub source: Option<String>,
}

/// A product with a quantity: cart changes and order lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product identifier.
    #[serde(default, alias = "product_id", deserialize_with = "lenient_id")]
    pub product_id: Option<String>,
    /// Display name at event time.
    #[serde(default, alias = "product_name", deserialize_with = "lenient_id")]
    pub product_name: Option<String>,
    /// Units; defaults to one.
    #[serde(default = "one", deserialize_with = "lenient_quantity")]
    pub quantity: u64,
    /// Unit price.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
}

impl Default for LineItem {
    fn default() -> Self {
        Self {
            product_id: None,
            product_name: None,
            quantity: 1,
            price: 0.0,
        }
    }
}

/// Order placement or cancellation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// Order identifier.
    #[serde(default, alias = "order_id", deserialize_with = "lenient_id")]
    pub order_id: Option<String>,
    /// Lines of the order.
    #[serde(default, alias = "products")]
    pub items: Vec<LineItem>,
    /// Order total.
    #[serde(default, alias = "total_amount", deserialize_with = "lenient_f64")]
    pub total_amount: f64,
}

/// Successful payment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Order identifier.
    #[serde(default, alias = "order_id", deserialize_with = "lenient_id")]
    pub order_id: Option<String>,
    /// Amount paid.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    /// Payment method.
    #[serde(default, alias = "payment_method", deserialize_with = "lenient_id")]
    pub method: Option<String>,
}

/// Catalog search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    /// Query text as typed.
    #[serde(alias = "search_query", alias = "searchQuery")]
    pub query: String,
    /// Number of results shown.
    #[serde(default, alias = "results_count", deserialize_with = "lenient_u64")]
    pub results_count: u64,
}

/// Discount code applied at checkout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountPayload {
    /// The code.
    #[serde(alias = "discount_code")]
    pub discount_code: String,
    /// Amount taken off.
    #[serde(default, alias = "discount_amount", deserialize_with = "lenient_f64")]
    pub discount_amount: f64,
    /// Order total before the discount.
    #[serde(default, alias = "order_total", deserialize_with = "lenient_f64")]
    pub order_total: f64,
    /// Order identifier.
    #[serde(default, alias = "order_id", deserialize_with = "lenient_id")]
    pub order_id: Option<String>,
    /// Percentage, fixed amount, shipping.
    #[serde(default, alias = "discount_type", deserialize_with = "lenient_id")]
    pub discount_type: Option<String>,
}

/// Free-text "build me a PC" request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcBuildRequest {
    /// What the customer typed.
    #[serde(default, alias = "user_input", alias = "prompt", deserialize_with = "lenient_id")]
    pub user_input: Option<String>,
    /// Budget as given (number or text).
    #[serde(default, deserialize_with = "lenient_id")]
    pub budget: Option<String>,
    /// Declared purpose.
    #[serde(default, deserialize_with = "lenient_id")]
    pub purpose: Option<String>,
}

/// A component picked or removed in the manual builder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcComponentPayload {
    /// CPU, GPU, RAM, ...
    #[serde(alias = "component_type", alias = "type")]
    pub component_type: String,
    /// Product identifier.
    #[serde(default, alias = "product_id", deserialize_with = "lenient_id")]
    pub product_id: Option<String>,
    /// Display name.
    #[serde(default, alias = "product_name", deserialize_with = "lenient_id")]
    pub product_name: Option<String>,
    /// Unit price.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
}

/// A complete build added to the cart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcBuildCartPayload {
    /// Components of the build.
    #[serde(default)]
    pub components: Vec<PcComponentPayload>,
    /// Build total.
    #[serde(default, alias = "total_price", deserialize_with = "lenient_f64")]
    pub total_price: f64,
}

/// Login, logout or registration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// Credentials, OTP, social.
    #[serde(default, deserialize_with = "lenient_id")]
    pub method: Option<String>,
    /// Identity provider for social logins.
    #[serde(default, deserialize_with = "lenient_id")]
    pub provider: Option<String>,
}

/// The typed `eventData` of a behavior event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// `product_viewed`, `product_click`
    ProductView(ProductRef),
    /// `product_added_to_cart`, `product_removed_from_cart`
    Cart(LineItem),
    /// `order_created`, `order_cancelled`
    Order(OrderPayload),
    /// `payment_completed`
    Payment(PaymentPayload),
    /// `search`
    Search(SearchPayload),
    /// `discount_usage`
    Discount(DiscountPayload),
    /// `auto_build_pc_request`
    PcBuildRequest(PcBuildRequest),
    /// `manual_build_pc_component_select`, `manual_build_pc_component_remove`
    PcComponent(PcComponentPayload),
    /// `auto_build_pc_add_to_cart`, `manual_build_pc_add_to_cart`
    PcBuildCart(PcBuildCartPayload),
    /// `user_authenticated`, `user_logout`, `user_registered`
    Auth(AuthPayload),
    /// Kinds that carry no payload schema.
    None,
    /// Payload of an unknown kind, kept verbatim.
    Raw(Value),
}

impl EventPayload {
    /// Parse `data` according to the schema of `kind`.
    ///
    /// A missing or `null` payload is treated as an empty object, so only kinds
    /// with required fields reject it.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the payload is not an object, lacks a
    /// required field or has a blank required field.
    pub fn parse(kind: &EventKind, data: Option<&Value>) -> Result<Self, PayloadError> {
        match kind {
            EventKind::ProductViewed | EventKind::ProductClick => {
                decode(kind, data).map(Self::ProductView)
            }
            EventKind::ProductAddedToCart | EventKind::ProductRemovedFromCart => {
                decode(kind, data).map(Self::Cart)
            }
            EventKind::OrderCreated | EventKind::OrderCancelled => {
                decode(kind, data).map(Self::Order)
            }
            EventKind::PaymentCompleted => decode(kind, data).map(Self::Payment),
            EventKind::Search => {
                let payload: SearchPayload = decode(kind, data)?;
                require(kind, "query", &payload.query)?;
                Ok(Self::Search(payload))
            }
            EventKind::DiscountUsage => {
                let payload: DiscountPayload = decode(kind, data)?;
                require(kind, "discountCode", &payload.discount_code)?;
                Ok(Self::Discount(payload))
            }
            EventKind::AutoBuildPcRequest => decode(kind, data).map(Self::PcBuildRequest),
            EventKind::ManualBuildPcComponentSelect | EventKind::ManualBuildPcComponentRemove => {
                let payload: PcComponentPayload = decode(kind, data)?;
                require(kind, "componentType", &payload.component_type)?;
                Ok(Self::PcComponent(payload))
            }
            EventKind::AutoBuildPcAddToCart | EventKind::ManualBuildPcAddToCart => {
                decode(kind, data).map(Self::PcBuildCart)
            }
            EventKind::UserAuthenticated | EventKind::UserLogout | EventKind::UserRegistered => {
                decode(kind, data).map(Self::Auth)
            }
            EventKind::PageView
            | EventKind::CategoryViewed
            | EventKind::CheckoutStarted
            | EventKind::SessionStart
            | EventKind::SessionEnd => Ok(Self::None),
            EventKind::Unknown(_) => Ok(Self::Raw(data.cloned().unwrap_or(Value::Null))),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(
    kind: &EventKind,
    data: Option<&Value>,
) -> Result<T, PayloadError> {
    let object = match data {
        None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
        Some(value @ Value::Object(_)) => value.clone(),
        Some(_) => {
            return Err(PayloadError::NotAnObject {
                kind: kind.to_string(),
            });
        }
    };
    serde_json::from_value(object).map_err(|e| PayloadError::Invalid {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn require(kind: &EventKind, field: &'static str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        return Err(PayloadError::EmptyField {
            kind: kind.to_string(),
            field,
        });
    }
    Ok(())
}

const fn one() -> u64 {
    1
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map_or(0.0, coerce_f64))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map_or(0, coerce_u64))
}

fn lenient_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_null()).as_ref().map(coerce_u64))
}

fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => 1,
        Some(v) => coerce_u64(&v),
    })
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_lines_accept_strings_and_default_quantity() {
        let payload = EventPayload::parse(
            &EventKind::OrderCreated,
            Some(&json!({
                "orderId": 1001,
                "items": [
                    { "productId": "P1", "quantity": "2", "price": "125.50" },
                    { "product_id": "P2", "price": null }
                ],
                "totalAmount": "251"
            })),
        )
        .unwrap();

        let EventPayload::Order(order) = payload else {
            unreachable!("order kind parses to an order payload");
        };
        assert_eq!(order.order_id.as_deref(), Some("1001"));
        assert_eq!(order.items[0].quantity, 2);
        assert!((order.items[0].price - 125.5).abs() < f64::EPSILON);
        assert_eq!(order.items[1].product_id.as_deref(), Some("P2"));
        assert_eq!(order.items[1].quantity, 1);
        assert!(order.items[1].price.abs() < f64::EPSILON);
        assert!((order.total_amount - 251.0).abs() < f64::EPSILON);
    }

    #[test]
    fn search_requires_a_query() {
        let err = EventPayload::parse(&EventKind::Search, Some(&json!({ "resultsCount": 0 })));
        assert!(matches!(err, Err(PayloadError::Invalid { .. })));

        let err = EventPayload::parse(&EventKind::Search, Some(&json!({ "query": "   " })));
        assert!(matches!(err, Err(PayloadError::EmptyField { field: "query", .. })));
    }

    #[test]
    fn missing_payload_is_an_empty_object() {
        let payload = EventPayload::parse(&EventKind::ProductViewed, None).unwrap();
        assert_eq!(payload, EventPayload::ProductView(ProductRef::default()));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = EventPayload::parse(&EventKind::PaymentCompleted, Some(&json!([1, 2])));
        assert!(matches!(err, Err(PayloadError::NotAnObject { .. })));
    }

    #[test]
    fn payload_less_kinds_ignore_data() {
        let payload = EventPayload::parse(&EventKind::PageView, Some(&json!("anything"))).unwrap();
        assert_eq!(payload, EventPayload::None);
    }

    #[test]
    fn unknown_kinds_keep_raw_payload() {
        let data = json!({ "wishlistId": 3 });
        let payload =
            EventPayload::parse(&EventKind::Unknown("wishlist_added".into()), Some(&data)).unwrap();
        assert_eq!(payload, EventPayload::Raw(data));
    }

    #[test]
    fn pc_build_cart_components_parse() {
        let payload = EventPayload::parse(
            &EventKind::ManualBuildPcAddToCart,
            Some(&json!({
                "components": [
                    { "componentType": "CPU", "productId": "c1", "price": 5000000 },
                    { "type": "GPU", "productId": "g1", "price": "12000000" }
                ],
                "totalPrice": 17000000
            })),
        )
        .unwrap();

        let EventPayload::PcBuildCart(cart) = payload else {
            unreachable!("build cart kind parses to a build cart payload");
        };
        assert_eq!(cart.components.len(), 2);
        assert_eq!(cart.components[1].component_type, "GPU");
    }
}
