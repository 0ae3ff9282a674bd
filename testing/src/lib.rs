//! # Storefront Insights Testing
//!
//! In-memory doubles and fixtures for Storefront Insights tests.
//!
//! This crate provides:
//! - [`InMemoryEventBus`]: publish/subscribe without a broker
//! - [`InMemoryEventStore`]: writer and reader with the Postgres store's semantics
//! - [`InMemoryCatalog`]: products, orders and customers
//! - [`FixedClock`]: deterministic time
//! - [`fixtures`]: event, date and window helpers
//! - [`properties`]: proptest strategies for domain types
//!
//! ## Example
//!
//! ```
//! use storefront_insights_core::event::EventKind;
//! use storefront_insights_testing::{at, behavior, InMemoryEventStore};
//!
//! let store = InMemoryEventStore::new();
//! store.seed(behavior(EventKind::ProductViewed, "session-a"), at(2024, 3, 1, 10, 0, 0));
//! assert_eq!(store.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use storefront_insights_core::environment::Clock;

pub mod catalog;
pub mod event_bus;
pub mod event_store;
pub mod fixtures;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_insights_testing::mocks::FixedClock;
    /// use storefront_insights_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use storefront_insights_core::event::EventKind;

    /// Any known event kind.
    pub fn known_event_kind() -> impl Strategy<Value = EventKind> {
        proptest::sample::select(EventKind::KNOWN.to_vec())
    }

    /// One of the meaningful interaction kinds.
    pub fn meaningful_kind() -> impl Strategy<Value = EventKind> {
        proptest::sample::select(
            EventKind::KNOWN
                .into_iter()
                .filter(EventKind::is_meaningful_interaction)
                .collect::<Vec<_>>(),
        )
    }

    /// Short session keys so generated events collide into shared sessions.
    pub fn session_id() -> impl Strategy<Value = String> {
        "s-[a-e]"
    }
}

/// Install a test-friendly tracing subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use catalog::InMemoryCatalog;
pub use event_bus::InMemoryEventBus;
pub use event_store::InMemoryEventStore;
pub use fixtures::{at, behavior, day, tracked, window, BehaviorEventFixture};
pub use mocks::{test_clock, FixedClock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }
}
