//! Ingestion runtime.
//!
//! - **`consumer`**: subscribe-process-reconnect loop over the event bus
//! - **`handlers`**: the per-message handler seam
//! - **`dispatch`**: tracking envelope to `behavior_events` row
//! - **`lifecycle`**: startup and graceful shutdown

pub mod consumer;
pub mod dispatch;
pub mod handlers;
pub mod lifecycle;

pub use consumer::EventConsumer;
pub use dispatch::{BehaviorEventDispatcher, Dispatch, DropReason};
pub use handlers::{EventHandler, HandlerError};
pub use lifecycle::Application;
