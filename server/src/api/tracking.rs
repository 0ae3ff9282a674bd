//! Tracking endpoints.
//!
//! Every endpoint validates its body, builds a [`TrackedEvent`], stamps the
//! caller's IP address and publishes it. A queued event answers
//! `202 {"status":"queued"}`; an invalid body answers 422 and is never
//! enqueued; a queue outage answers 503.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/tracking/events \
//!   -H 'Content-Type: application/json' \
//!   -d '{"eventType":"product_viewed","sessionId":"s-1","eventData":{"productId":"P1"}}'
//! # {"status":"queued"}
//! ```

use super::json_body;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::IpAddr;
use storefront_insights_core::event::{EventKind, TrackedEvent, ValidationError};
use storefront_insights_web::{ClientIp, CorrelationId, UserAgent, WebResult};
use tracing::Instrument;

/// Body of `POST /api/tracking/product-click`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductClickRequest {
    /// Browsing session key
    #[serde(default)]
    pub session_id: String,
    /// Clicked product, string or numeric id
    #[serde(default)]
    pub product_id: Option<Value>,
    /// Signed-in customer
    #[serde(default)]
    pub customer_id: Option<i64>,
    /// Page the click happened on
    #[serde(default)]
    pub page_url: Option<String>,
    /// Position of the tile in its list
    #[serde(default)]
    pub position: Option<u64>,
    /// List the tile belonged to (search, category, recommendations)
    #[serde(default)]
    pub source: Option<String>,
    /// Client device description
    #[serde(default)]
    pub device_info: Option<Value>,
}

/// Body of `POST /api/tracking/discount-usage`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountUsageRequest {
    /// Browsing session key
    #[serde(default)]
    pub session_id: String,
    /// Applied code
    #[serde(default)]
    pub discount_code: String,
    /// Amount taken off the order
    #[serde(default)]
    pub discount_amount: Option<f64>,
    /// Order total before the discount
    #[serde(default)]
    pub order_total: Option<f64>,
    /// Order the code was applied to
    #[serde(default)]
    pub order_id: Option<String>,
    /// Percentage, fixed amount, free shipping
    #[serde(default)]
    pub discount_type: Option<String>,
    /// Signed-in customer
    #[serde(default)]
    pub customer_id: Option<i64>,
}

/// Body of `POST /api/tracking/auth`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// `login`, `logout` or `register`
    #[serde(default)]
    pub action: String,
    /// The customer signing in, out or up
    #[serde(default)]
    pub customer_id: Option<i64>,
    /// Browsing session key
    #[serde(default)]
    pub session_id: String,
    /// Credential type or identity provider
    #[serde(default)]
    pub method: Option<String>,
}

fn required(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ProductClickRequest {
    /// Build the `product_click` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] for a blank session or product.
    pub fn into_event(self) -> Result<TrackedEvent, ValidationError> {
        required(&self.session_id, "sessionId")?;
        let product_id =
            id_string(self.product_id.as_ref()).ok_or(ValidationError::MissingField("productId"))?;

        let mut data = Map::new();
        data.insert("productId".to_string(), Value::String(product_id.clone()));
        if let Some(position) = self.position {
            data.insert("position".to_string(), json!(position));
        }
        if let Some(source) = self.source {
            data.insert("source".to_string(), Value::String(source));
        }

        let mut event = TrackedEvent::new(EventKind::ProductClick, self.session_id.trim());
        event.customer_id = self.customer_id;
        event.entity_id = Some(product_id);
        event.entity_type = Some("product".to_string());
        event.page_url = self.page_url;
        event.device_info = self.device_info;
        event.event_data = Some(Value::Object(data));
        Ok(event)
    }
}

impl DiscountUsageRequest {
    /// Build the `discount_usage` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a blank session or code, or a missing
    /// or negative amount.
    pub fn into_event(self) -> Result<TrackedEvent, ValidationError> {
        required(&self.session_id, "sessionId")?;
        required(&self.discount_code, "discountCode")?;
        let amount = self
            .discount_amount
            .ok_or(ValidationError::MissingField("discountAmount"))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "discountAmount",
                reason: "must be a non-negative number".to_string(),
            });
        }

        let code = self.discount_code.trim().to_string();
        let mut data = Map::new();
        data.insert("discountCode".to_string(), Value::String(code.clone()));
        data.insert("discountAmount".to_string(), json!(amount));
        if let Some(total) = self.order_total {
            data.insert("orderTotal".to_string(), json!(total));
        }
        if let Some(order_id) = self.order_id {
            data.insert("orderId".to_string(), Value::String(order_id));
        }
        if let Some(kind) = self.discount_type {
            data.insert("discountType".to_string(), Value::String(kind));
        }

        let mut event = TrackedEvent::new(EventKind::DiscountUsage, self.session_id.trim());
        event.customer_id = self.customer_id;
        event.entity_id = Some(code);
        event.entity_type = Some("discount".to_string());
        event.event_data = Some(Value::Object(data));
        Ok(event)
    }
}

impl AuthRequest {
    /// Build the `user_authenticated`, `user_logout` or `user_registered` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an unknown action or a missing
    /// customer or session.
    pub fn into_event(self) -> Result<TrackedEvent, ValidationError> {
        let kind = match self.action.trim().to_lowercase().as_str() {
            "login" => EventKind::UserAuthenticated,
            "logout" => EventKind::UserLogout,
            "register" => EventKind::UserRegistered,
            "" => return Err(ValidationError::MissingField("action")),
            other => {
                return Err(ValidationError::InvalidField {
                    field: "action",
                    reason: format!("expected login, logout or register, got '{other}'"),
                })
            },
        };
        let customer_id = self
            .customer_id
            .ok_or(ValidationError::MissingField("customerId"))?;
        required(&self.session_id, "sessionId")?;

        let mut event = TrackedEvent::new(kind, self.session_id.trim());
        event.customer_id = Some(customer_id);
        event.entity_id = Some(customer_id.to_string());
        event.entity_type = Some("user".to_string());
        event.event_data = self.method.map(|method| json!({ "method": method }));
        Ok(event)
    }
}

async fn enqueue(
    state: &AppState,
    mut event: TrackedEvent,
    CorrelationId(correlation_id): CorrelationId,
    ip: IpAddr,
    user_agent: String,
) -> WebResult<(StatusCode, Json<Value>)> {
    event.ip_address = Some(ip.to_string());
    if event.device_info.is_none() {
        event.device_info = Some(json!({ "userAgent": user_agent }));
    }

    let span = tracing::info_span!(
        "track",
        %correlation_id,
        event_type = %event.event_type,
        session_id = %event.session_id
    );
    state.publisher.publish(&event).instrument(span).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))))
}

/// `POST /api/tracking/events`: any tracking envelope.
///
/// Unknown event types are accepted and queued; the consumer drops them.
///
/// # Errors
///
/// 422 for an invalid envelope, 503 when the queue is down.
pub async fn track_event(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    payload: Result<Json<TrackedEvent>, JsonRejection>,
) -> WebResult<(StatusCode, Json<Value>)> {
    let event = json_body(payload)?;
    enqueue(&state, event, correlation_id, ip, user_agent).await
}

/// `POST /api/tracking/product-click`.
///
/// # Errors
///
/// 422 for a missing session or product, 503 when the queue is down.
pub async fn product_click(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    payload: Result<Json<ProductClickRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<Value>)> {
    let event = json_body(payload)?.into_event()?;
    enqueue(&state, event, correlation_id, ip, user_agent).await
}

/// `POST /api/tracking/discount-usage`.
///
/// # Errors
///
/// 422 for a missing session, code or amount, 503 when the queue is down.
pub async fn discount_usage(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    payload: Result<Json<DiscountUsageRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<Value>)> {
    let event = json_body(payload)?.into_event()?;
    enqueue(&state, event, correlation_id, ip, user_agent).await
}

/// `POST /api/tracking/auth`.
///
/// # Errors
///
/// 422 for an unknown action or missing ids, 503 when the queue is down.
pub async fn auth_event(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<Value>)> {
    let event = json_body(payload)?.into_event()?;
    enqueue(&state, event, correlation_id, ip, user_agent).await
}
