//! Message handler seam of the consumer.
//!
//! [`EventConsumer`](super::EventConsumer) owns subscription, reconnection
//! and shutdown; an [`EventHandler`] owns what happens to one message. The
//! handler receives raw bytes so the consumer stays independent of the
//! envelope format.

use async_trait::async_trait;

/// Boxed error returned by handlers. The consumer logs it and moves on.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one queue message.
///
/// Implementors must be `Send + Sync + 'static` because the handler is
/// shared with the consumer task.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle a raw message body (UTF-8 JSON).
    ///
    /// Return `Ok(())` for messages that were processed or deliberately
    /// dropped; return an error only for failures worth logging at error level.
    ///
    /// # Errors
    ///
    /// Infrastructure failures such as a rejected database write.
    async fn handle(&self, data: &[u8]) -> Result<(), HandlerError>;
}
