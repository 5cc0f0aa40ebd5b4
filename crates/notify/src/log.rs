//! Log-only messenger for development and dry runs.
//!
//! Stands in when no gateway is configured: every outbound text is
//! written to the log instead of a chat transport.

use tracing::info;

use crate::traits::{Messenger, NotifyError};

#[derive(Debug, Default)]
pub struct LogMessenger;

impl LogMessenger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Messenger for LogMessenger {
    async fn send_text(&self, user_id: &str, message: &str) -> Result<(), NotifyError> {
        info!(to = user_id, message, "text (log channel, not delivered)");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
