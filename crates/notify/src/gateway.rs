//! HTTP messaging-gateway messenger.
//!
//! Posts `{"to": ..., "body": ...}` JSON to the configured gateway
//! endpoint with an optional bearer token. The gateway relays to the
//! actual chat transport and owns delivery retries.

use tracing::debug;

use shed_core::config::GatewayConfig;

use crate::traits::{Messenger, NotifyError};

/// Sends texts through an HTTP messaging gateway.
#[derive(Debug)]
pub struct HttpGatewayMessenger {
    send_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpGatewayMessenger {
    /// Build from config. Returns [`NotifyError::Config`] when no send
    /// URL is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, NotifyError> {
        let send_url = config
            .send_url
            .clone()
            .ok_or_else(|| NotifyError::Config("SHED_GATEWAY_SEND_URL is not set".to_string()))?;

        Ok(Self {
            send_url,
            token: config.token.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Messenger for HttpGatewayMessenger {
    async fn send_text(&self, user_id: &str, message: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "to": user_id,
            "body": message,
        });

        debug!(to = user_id, "sending text via gateway");

        let mut request = self.client.post(&self.send_url).json(&body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "gateway"
    }
}
