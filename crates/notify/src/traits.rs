//! Messenger trait definition and shared error types.

/// Errors that can occur while handing a message to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned status {status}")]
    Status { status: u16 },

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Trait for outbound text delivery.
///
/// Delivery is fire-and-forget from the engine's perspective: a
/// successful return means the gateway accepted the message, and any
/// retrying happens on the gateway side.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message to a user.
    async fn send_text(&self, user_id: &str, message: &str) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "gateway", "stdout").
    fn channel_name(&self) -> &str;
}
