//! Subscription/outage reconciliation.
//!
//! The reconciler runs once at startup (recovery) and then on a fixed
//! interval. Each steady-state pass snapshots the subscriptions,
//! fetches windows once per distinct area with bounded concurrency,
//! and schedules a timer for every (user, window) pair the ledger has
//! not seen yet. The exclusive-key insert in the ledger is the
//! idempotence guard that makes polling an unchanged source safe.
//!
//! A failed fetch means "no new information" for that area this cycle:
//! nothing is cancelled, nothing is expired, and the next pass retries.
//! That periodicity is the engine's entire retry policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use shed_core::config::EngineConfig;
use shed_core::{AlertKey, OutageWindow};
use shed_notify::AlertMessage;
use shed_source::OutageSource;
use shed_store::{NotificationLedger, StoreError, SubscriptionStore};

use crate::scheduler::{AlertScheduler, ScheduleOutcome};

/// Counters from one startup recovery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Pending entries whose timers were re-registered.
    pub rescheduled: usize,
    /// Pending entries whose fire time elapsed while the process was down.
    pub expired: usize,
}

/// Counters from one steady-state reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub subscriptions: usize,
    pub areas_fetched: usize,
    pub areas_failed: usize,
    /// New (user, window) pairs that got a timer this pass.
    pub scheduled: usize,
    /// New pairs discovered too late for their lead time.
    pub expired: usize,
    /// Pairs the ledger had already seen.
    pub already_known: usize,
}

pub struct Reconciler {
    subscriptions: Arc<SubscriptionStore>,
    ledger: Arc<NotificationLedger>,
    source: Arc<dyn OutageSource>,
    scheduler: Arc<AlertScheduler>,
    config: EngineConfig,
    fetch_concurrency: usize,
}

impl Reconciler {
    pub fn new(
        subscriptions: Arc<SubscriptionStore>,
        ledger: Arc<NotificationLedger>,
        source: Arc<dyn OutageSource>,
        scheduler: Arc<AlertScheduler>,
        config: EngineConfig,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            source,
            scheduler,
            config,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Startup recovery: rebuild the in-memory timer set from `Pending`
    /// ledger entries, expiring any whose fire time has already passed.
    pub async fn recover(&self) -> RecoveryStats {
        let mut stats = RecoveryStats::default();
        let now = Utc::now();

        for entry in self.ledger.list_pending().await {
            let key = entry.key();
            if entry.scheduled_fire_at <= now {
                if let Err(e) = self.ledger.mark_expired(&key).await {
                    warn!(key = %key, error = %e, "failed to expire stale entry");
                    continue;
                }
                stats.expired += 1;
                continue;
            }

            // Window end is not recorded in the ledger; the message
            // renders without it after a recovery.
            let alert = AlertMessage {
                area: entry.area.clone(),
                start: entry.scheduled_fire_at + self.config.lead_time(),
                end: None,
                lead_time_minutes: self.config.lead_time_minutes,
            };
            match self
                .scheduler
                .schedule(key.clone(), entry.scheduled_fire_at, alert)
            {
                ScheduleOutcome::Scheduled => stats.rescheduled += 1,
                ScheduleOutcome::AlreadyScheduled => {}
                ScheduleOutcome::AlreadyPast => {
                    // Elapsed between the check above and here.
                    if let Err(e) = self.ledger.mark_expired(&key).await {
                        warn!(key = %key, error = %e, "failed to expire stale entry");
                    } else {
                        stats.expired += 1;
                    }
                }
            }
        }

        info!(
            rescheduled = stats.rescheduled,
            expired = stats.expired,
            "startup recovery complete"
        );
        stats
    }

    /// One steady-state pass over all subscriptions.
    pub async fn reconcile_once(&self) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let subscriptions = self.subscriptions.list().await;
        stats.subscriptions = subscriptions.len();

        let fetched = self.fetch_all_areas(&subscriptions).await;
        stats.areas_fetched = fetched.len();
        stats.areas_failed = distinct_areas(&subscriptions).len() - fetched.len();

        for sub in &subscriptions {
            let windows = match fetched.get(&sub.area) {
                Some(windows) => windows,
                // Fetch failed: no new information for this area this
                // cycle, existing state untouched.
                None => continue,
            };
            for window in windows {
                self.process_pair(&sub.user_id, window, &mut stats).await;
            }
        }

        info!(
            subscriptions = stats.subscriptions,
            areas_fetched = stats.areas_fetched,
            areas_failed = stats.areas_failed,
            scheduled = stats.scheduled,
            expired = stats.expired,
            already_known = stats.already_known,
            "reconciliation pass complete"
        );
        stats
    }

    /// Run recovery, then reconcile forever on the configured interval.
    pub async fn run(&self) {
        self.recover().await;
        let period = StdDuration::from_secs(self.config.reconcile_interval_secs);
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.reconcile_once().await;
        }
    }

    /// Fetch windows once per distinct area, a bounded number of areas
    /// in flight at a time. Failed areas are logged and left out of the
    /// result.
    async fn fetch_all_areas(
        &self,
        subscriptions: &[shed_core::Subscription],
    ) -> HashMap<String, Vec<OutageWindow>> {
        let areas = distinct_areas(subscriptions);

        let results: Vec<(String, Result<Vec<OutageWindow>, shed_source::SourceError>)> =
            stream::iter(areas)
                .map(|area| {
                    let source = Arc::clone(&self.source);
                    async move {
                        let result = source.fetch_windows(&area).await;
                        (area, result)
                    }
                })
                .buffer_unordered(self.fetch_concurrency)
                .collect()
                .await;

        let mut fetched = HashMap::new();
        for (area, result) in results {
            match result {
                Ok(windows) => {
                    debug!(area, count = windows.len(), "fetched outage windows");
                    fetched.insert(area, windows);
                }
                Err(e) => {
                    warn!(area, error = %e, "outage source unavailable, skipping area this cycle");
                }
            }
        }
        fetched
    }

    /// Handle one (user, window) pair: skip if the ledger knows it,
    /// otherwise record it and either register a timer or expire it
    /// on the spot.
    async fn process_pair(
        &self,
        user_id: &str,
        window: &OutageWindow,
        stats: &mut ReconcileStats,
    ) {
        let key = AlertKey::new(user_id, window.window_id());
        if self.ledger.lookup(&key).await.is_some() {
            stats.already_known += 1;
            return;
        }

        let fire_at = window.start - self.config.lead_time();
        match self
            .ledger
            .insert_pending(&key, &window.area, fire_at)
            .await
        {
            Ok(_) => {}
            Err(StoreError::DuplicateKey { .. }) => {
                // Lost a race with a concurrent pass; the winner owns it.
                stats.already_known += 1;
                return;
            }
            Err(e) => {
                // Not durable, so no timer. The next pass retries.
                warn!(key = %key, error = %e, "ledger write failed, pair deferred");
                return;
            }
        }

        if fire_at <= Utc::now() {
            // Discovered too late: window starts within the lead time
            // (or already started). No alert.
            if let Err(e) = self.ledger.mark_expired(&key).await {
                warn!(key = %key, error = %e, "failed to expire late entry");
            } else {
                debug!(key = %key, start = %window.start, "window discovered too late, expired");
                stats.expired += 1;
            }
            return;
        }

        let alert = AlertMessage {
            area: window.area.clone(),
            start: window.start,
            end: Some(window.end),
            lead_time_minutes: self.config.lead_time_minutes,
        };
        match self.scheduler.schedule(key.clone(), fire_at, alert) {
            ScheduleOutcome::Scheduled => stats.scheduled += 1,
            ScheduleOutcome::AlreadyScheduled => stats.already_known += 1,
            ScheduleOutcome::AlreadyPast => {
                if let Err(e) = self.ledger.mark_expired(&key).await {
                    warn!(key = %key, error = %e, "failed to expire late entry");
                } else {
                    stats.expired += 1;
                }
            }
        }
    }
}

fn distinct_areas(subscriptions: &[shed_core::Subscription]) -> Vec<String> {
    let mut areas: Vec<String> = subscriptions.iter().map(|s| s.area.clone()).collect();
    areas.sort();
    areas.dedup();
    areas
}
