//! # Storefront Insights Core
//!
//! Shared types for the storefront analytics backend.
//!
//! - [`event`]: event kinds, the tracking envelope and the persisted row
//! - [`payload`]: structured `eventData` schemas per event family
//! - [`coerce`]: NaN-free numeric coercion for money and quantities
//! - [`time`]: report windows and dense daily series
//! - [`classify`]: page and device classification
//! - [`event_bus`]: the queue abstraction
//! - [`store`]: event store and commerce catalog seams
//! - [`environment`]: injected clock
//!
//! ## Example
//!
//! ```
//! use storefront_insights_core::event::{EventKind, TrackedEvent};
//!
//! let event = TrackedEvent::new(EventKind::SessionStart, "session-42");
//! assert!(event.validate().is_ok());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use chrono_tz::Tz;

pub mod classify;
pub mod coerce;
pub mod environment;
pub mod event;
pub mod event_bus;
pub mod payload;
pub mod store;
pub mod time;
