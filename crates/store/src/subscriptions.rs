//! Durable user -> area subscription store.
//!
//! Persisted as `{user_id: area}` in a single JSON document. Held in
//! memory behind `Arc<RwLock<_>>` for concurrent access; every mutation
//! is written to disk before it returns, so the reconciler always sees
//! a consistent snapshot and restarts lose nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use shed_core::Subscription;

use crate::document;
use crate::error::StoreError;

pub struct SubscriptionStore {
    path: PathBuf,
    subs: Arc<RwLock<HashMap<String, String>>>,
}

impl SubscriptionStore {
    /// Open the store at `path`, creating parent directories as needed.
    /// A corrupt or unreadable document starts the store empty (logged)
    /// rather than failing startup.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let subs = document::load_or_empty(path);
        info!(path = %path.display(), count = subs.len(), "subscription store opened");
        Ok(Self {
            path: path.to_path_buf(),
            subs: Arc::new(RwLock::new(subs)),
        })
    }

    /// Area the user is subscribed to, if any.
    pub async fn get(&self, user_id: &str) -> Option<String> {
        self.subs.read().await.get(user_id).cloned()
    }

    /// Subscribe (or re-subscribe) a user. Overwrites any prior area.
    pub async fn set(&self, user_id: &str, area: &str) -> Result<(), StoreError> {
        let mut subs = self.subs.write().await;
        let previous = subs.insert(user_id.to_string(), area.to_string());
        if let Err(e) = document::persist(&self.path, &subs) {
            // Roll back so memory never claims durability we don't have.
            match previous {
                Some(prev) => subs.insert(user_id.to_string(), prev),
                None => subs.remove(user_id),
            };
            return Err(e);
        }
        info!(user = user_id, area, "subscription set");
        Ok(())
    }

    /// Remove a user's subscription. Returns `true` if one existed.
    pub async fn remove(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut subs = self.subs.write().await;
        let previous = match subs.remove(user_id) {
            Some(prev) => prev,
            None => return Ok(false),
        };
        if let Err(e) = document::persist(&self.path, &subs) {
            subs.insert(user_id.to_string(), previous);
            return Err(e);
        }
        info!(user = user_id, "subscription removed");
        Ok(true)
    }

    /// Snapshot of all subscriptions. Order is not meaningful.
    pub async fn list(&self) -> Vec<Subscription> {
        self.subs
            .read()
            .await
            .iter()
            .map(|(user_id, area)| Subscription {
                user_id: user_id.clone(),
                area: area.clone(),
            })
            .collect()
    }
}
