//! # Storefront Insights server
//!
//! One process hosting the three moving parts of the analytics backend:
//!
//! - **Tracking API** (`POST /api/tracking/*`): validates storefront events
//!   and publishes them to Redpanda, answering 202 once queued
//! - **Ingestion consumer**: reads the behavior and auth topics and writes
//!   one `behavior_events` row per recognised event
//! - **Report API** (`GET /api/analytics/*`): sales, order, inventory and
//!   behavior reports computed on demand from Postgres
//!
//! ```text
//! storefront ──POST──▶ tracking ──publish──▶ Redpanda
//!                                               │
//!                                    consumer ◀─┘
//!                                       │ dispatch
//!                                       ▼
//!   dashboard ◀──GET── reports ◀── behavior_events + catalog
//! ```
//!
//! [`app::build`] wires the production stores; [`routes::build_router`] takes
//! an [`AppState`] over any store implementation, which is how the tests run
//! the API against in-memory stores.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod app;
pub mod config;
pub mod health;
pub mod routes;
pub mod runtime;
pub mod state;
pub mod telemetry;
pub mod tracking;

pub use config::{Config, ConfigError};
pub use routes::build_router;
pub use state::AppState;
pub use tracking::{EventPublisher, PublishError};
