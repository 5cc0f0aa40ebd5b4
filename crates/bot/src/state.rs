use std::sync::Arc;

use shed_engine::AlertScheduler;
use shed_notify::Messenger;
use shed_source::OutageSource;
use shed_store::{NotificationLedger, SubscriptionStore};

/// Shared handles for the webhook handlers and command layer.
pub struct AppState {
    pub subscriptions: Arc<SubscriptionStore>,
    pub ledger: Arc<NotificationLedger>,
    pub source: Arc<dyn OutageSource>,
    pub messenger: Arc<dyn Messenger>,
    pub scheduler: Arc<AlertScheduler>,
}
