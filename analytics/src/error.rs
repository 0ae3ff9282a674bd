//! Report errors.

use storefront_insights_core::store::StoreError;
use storefront_insights_core::time::RangeError;
use thiserror::Error;

/// Why a report could not be computed.
///
/// Reports never substitute placeholder data; the HTTP boundary decides how
/// to surface each variant.
#[derive(Error, Debug, Clone)]
pub enum AnalyticsError {
    /// The event store or catalog query failed.
    #[error("store query failed: {0}")]
    Store(#[from] StoreError),

    /// The requested window is invalid.
    #[error("invalid date range: {0}")]
    InvalidRange(#[from] RangeError),

    /// A report parameter is out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name as the caller spelled it.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl AnalyticsError {
    /// Whether the caller, not the backend, is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRange(_) | Self::InvalidParameter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_server_errors() {
        let error = AnalyticsError::from(StoreError::Database("connection reset".to_string()));
        assert!(!error.is_client_error());
        assert_eq!(
            error.to_string(),
            "store query failed: Database error: connection reset"
        );
    }

    #[test]
    fn parameter_errors_are_client_errors() {
        let error = AnalyticsError::InvalidParameter {
            name: "steps",
            reason: "at least one step is required".to_string(),
        };
        assert!(error.is_client_error());
    }
}
