//! HTTP endpoints.
//!
//! - `POST /api/tracking/*`: enqueue tracking events ([`tracking`])
//! - `GET /api/analytics/*`: on-demand reports ([`reports`])

pub mod reports;
pub mod tracking;

use crate::tracking::PublishError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use storefront_insights_analytics::AnalyticsError;
use storefront_insights_web::AppError;

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Invalid(invalid) => Self::from(invalid),
            PublishError::Bus(bus) => Self::unavailable("Event queue is unavailable").with_source(bus),
        }
    }
}

/// Map an [`AnalyticsError`] to an [`AppError`]. A free function rather than
/// a `From` impl because both types are foreign to this crate (orphan rule).
pub(crate) fn analytics_error(err: AnalyticsError) -> AppError {
    if err.is_client_error() {
        AppError::bad_request(err.to_string())
    } else {
        AppError::internal("Failed to compute report").with_source(err)
    }
}

/// Unwrap a JSON body; schema mismatches are 422, unreadable bodies 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::JsonDataError(e)) => Err(AppError::validation(e.body_text())),
        Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
    }
}

/// Unwrap query parameters; any failure is 400.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
