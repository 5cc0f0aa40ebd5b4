//! Inbound HTTP surface.
//!
//! The messaging gateway POSTs each inbound chat message to `/webhook`;
//! the reply (if any) goes back out through the messenger and is also
//! echoed in the response body for the gateway's logs.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::commands;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    /// Gateway-assigned sender id; doubles as our user id.
    pub from: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub handled: bool,
    pub reply: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub pending_timers: usize,
    pub pending_ledger_entries: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pending_timers: state.scheduler.pending_timers(),
        pending_ledger_entries: state.ledger.list_pending().await.len(),
    })
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(message): Json<InboundMessage>,
) -> Json<WebhookResponse> {
    let command = match commands::parse(&message.body) {
        Some(command) => command,
        None => {
            debug!(from = %message.from, "ignoring non-command message");
            return Json(WebhookResponse {
                handled: false,
                reply: None,
            });
        }
    };

    let reply = commands::handle(command, &message.from, &state).await;
    if let Err(e) = state.messenger.send_text(&message.from, &reply).await {
        // The gateway still gets the reply in the response body.
        warn!(to = %message.from, error = %e, "failed to send command reply");
    }

    Json(WebhookResponse {
        handled: true,
        reply: Some(reply),
    })
}
