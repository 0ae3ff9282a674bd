//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation id
//! - `ClientIp`: caller address, proxy headers first
//! - `UserAgent`: the `User-Agent` header
//!
//! # Examples
//!
//! ```ignore
//! async fn track(
//!     State(state): State<AppState>,
//!     CorrelationId(correlation_id): CorrelationId,
//!     ClientIp(ip): ClientIp,
//!     Json(mut event): Json<TrackedEvent>,
//! ) -> Result<StatusCode, AppError> {
//!     event.ip_address = Some(ip.to_string());
//!     let span = tracing::info_span!("track", %correlation_id);
//!     state.publisher.publish(&event).instrument(span).await?;
//!     Ok(StatusCode::ACCEPTED)
//! }
//! ```

use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Uses the id stored by [`correlation_id_layer`](crate::middleware::correlation_id_layer)
/// when the layer is installed, else the `X-Correlation-ID` header, else a new
/// UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(|| {
                parts
                    .headers
                    .get(CORRELATION_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection address, when the server runs with `into_make_service_with_connect_info`
/// 4. Loopback
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self(extract_client_ip(&parts.headers, connect_info)))
    }
}

fn extract_client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    connect_info.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |ConnectInfo(addr)| addr.ip())
}

/// User-Agent header, or `"Unknown"`.
#[derive(Debug, Clone)]
pub struct UserAgent(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        Ok(Self(user_agent))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(Request::builder().header(CORRELATION_ID_HEADER, uuid.to_string()));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let stored = Uuid::new_v4();
        let mut parts = parts(Request::builder().header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string()));
        parts.extensions.insert(stored);

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(correlation_id.0, stored);
    }

    #[tokio::test]
    async fn test_correlation_id_generates_new() {
        let mut parts = parts(Request::builder());

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();

        assert_ne!(correlation_id.0, Uuid::nil());
    }

    #[tokio::test]
    async fn test_client_ip_from_x_forwarded_for() {
        let mut parts = parts(Request::builder().header("X-Forwarded-For", "203.0.113.1, 198.51.100.1"));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn test_client_ip_from_x_real_ip() {
        let mut parts = parts(Request::builder().header("X-Real-IP", "198.51.100.42"));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "198.51.100.42");
    }

    #[tokio::test]
    async fn test_client_ip_from_connection() {
        let mut parts = parts(Request::builder());
        parts
            .extensions
            .insert(ConnectInfo("192.0.2.7:51000".parse::<SocketAddr>().unwrap()));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "192.0.2.7");
    }

    #[tokio::test]
    async fn test_client_ip_fallback() {
        let mut parts = parts(Request::builder());

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_user_agent() {
        let mut with = parts(Request::builder().header(header::USER_AGENT, "Mozilla/5.0 (Test)"));
        let mut without = parts(Request::builder());

        assert_eq!(UserAgent::from_request_parts(&mut with, &()).await.unwrap().0, "Mozilla/5.0 (Test)");
        assert_eq!(UserAgent::from_request_parts(&mut without, &()).await.unwrap().0, "Unknown");
    }
}
