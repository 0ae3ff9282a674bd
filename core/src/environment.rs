//! Injected dependencies.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time so stores and tests agree on "now".
///
/// # Examples
///
/// ```
/// use storefront_insights_core::environment::{Clock, SystemClock};
///
/// let now = SystemClock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
