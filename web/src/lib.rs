//! Axum plumbing for Storefront Insights.
//!
//! The HTTP surface of the service is thin: handlers parse a request, call
//! the tracking publisher or the analytics facade, and map the outcome to a
//! response. This crate holds the pieces every handler shares.
//!
//! ```text
//! request ──► correlation_id_layer ──► extractors ──► handler ──► AppError / JSON
//!              (span + header)          (ClientIp,
//!                                        UserAgent,
//!                                        CorrelationId)
//! ```
//!
//! - [`AppError`]: `{code, message}` JSON errors with the right status
//! - [`extractors`]: caller address, user agent and correlation id
//! - [`middleware`]: the correlation-id layer
//! - [`handlers::health`]: liveness and readiness endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId, UserAgent};
pub use handlers::{health_check, readiness_check, HealthCheck, ReadinessProbe};
pub use middleware::{correlation_id_layer, CorrelationIdExt, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
