//! Durable notification ledger.
//!
//! One record per (user, window) pair, keyed by [`AlertKey`]. The ledger
//! is the source of truth for what has been scheduled: the scheduler's
//! in-memory timers are rebuilt from `Pending` entries at startup, so
//! every mutation here is persisted before the caller may act on it.
//!
//! The exclusive-key insert is what makes repeated reconciliation passes
//! over an unchanged source response safe: the second pass finds the
//! entry and skips the pair.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shed_core::{AlertKey, AlertState, LedgerEntry};

use crate::document;
use crate::error::StoreError;

pub struct NotificationLedger {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, LedgerEntry>>>,
}

impl NotificationLedger {
    /// Open the ledger at `path`, creating parent directories as needed.
    /// Corrupt or unreadable documents start the ledger empty (logged).
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries: HashMap<String, LedgerEntry> = document::load_or_empty(path);
        info!(path = %path.display(), count = entries.len(), "notification ledger opened");
        Ok(Self {
            path: path.to_path_buf(),
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub async fn lookup(&self, key: &AlertKey) -> Option<LedgerEntry> {
        self.entries.read().await.get(&key.to_string()).cloned()
    }

    /// Record a new `Pending` entry. Fails with [`StoreError::DuplicateKey`]
    /// if any entry exists for the key; callers racing on the same pair
    /// treat that as success. The entry is durable on disk before this
    /// returns, so a timer may only be registered afterwards.
    pub async fn insert_pending(
        &self,
        key: &AlertKey,
        area: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let map_key = key.to_string();
        if entries.contains_key(&map_key) {
            return Err(StoreError::DuplicateKey { key: map_key });
        }

        let entry = LedgerEntry {
            user_id: key.user_id.clone(),
            window_id: key.window_id.clone(),
            area: area.to_string(),
            state: AlertState::Pending,
            scheduled_fire_at: fire_at,
        };
        entries.insert(map_key.clone(), entry.clone());

        if let Err(e) = document::persist(&self.path, &entries) {
            // A timer must never outlive its durable Pending record.
            entries.remove(&map_key);
            return Err(e);
        }
        debug!(key = %map_key, fire_at = %fire_at, "ledger entry pending");
        Ok(entry)
    }

    /// Transition `Pending -> Fired`. No-op (logged) if the entry is
    /// missing or already terminal.
    pub async fn mark_fired(&self, key: &AlertKey) -> Result<(), StoreError> {
        self.transition(key, AlertState::Fired).await
    }

    /// Transition `Pending -> Expired`. No-op (logged) if the entry is
    /// missing or already terminal.
    pub async fn mark_expired(&self, key: &AlertKey) -> Result<(), StoreError> {
        self.transition(key, AlertState::Expired).await
    }

    async fn transition(&self, key: &AlertKey, to: AlertState) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let map_key = key.to_string();
        let entry = match entries.get_mut(&map_key) {
            Some(e) => e,
            None => {
                warn!(key = %map_key, ?to, "transition on unknown ledger key ignored");
                return Ok(());
            }
        };
        if entry.state != AlertState::Pending {
            // Terminal states never change.
            debug!(key = %map_key, from = ?entry.state, ?to, "ledger entry already terminal");
            return Ok(());
        }

        let previous = entry.state;
        entry.state = to;
        if let Err(e) = document::persist(&self.path, &entries) {
            if let Some(entry) = entries.get_mut(&map_key) {
                entry.state = previous;
            }
            return Err(e);
        }
        debug!(key = %map_key, ?to, "ledger entry transitioned");
        Ok(())
    }

    /// All entries still awaiting their timer, in no particular order.
    pub async fn list_pending(&self) -> Vec<LedgerEntry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.state == AlertState::Pending)
            .cloned()
            .collect()
    }
}
