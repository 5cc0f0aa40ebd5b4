//! Keyed one-shot alert timers.
//!
//! The scheduler owns one in-memory timer per `Pending` ledger entry,
//! keyed by [`AlertKey`]. Each timer is a spawned tokio task sleeping
//! until its fire time; on expiry it claims its key, renders the alert
//! text, hands it to the messenger, and marks the ledger entry `Fired`.
//!
//! Delivery retry is the gateway's job: a failed send still counts as
//! fired, which bounds this component's retry surface to zero and rules
//! out duplicate-alert storms against a flaky channel.
//!
//! Cancellation races against an in-flight expiry are closed with a
//! per-timer claimed flag: whichever side flips it first wins, so a
//! timer that has started sending can no longer be aborted and a
//! cancelled timer can no longer send.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shed_core::AlertKey;
use shed_notify::{AlertMessage, Messenger};
use shed_store::NotificationLedger;

/// Result of a `schedule` call. Only `Scheduled` registers a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new timer was registered.
    Scheduled,
    /// A timer for this key already exists; the call was a no-op.
    AlreadyScheduled,
    /// The fire time has already elapsed; the caller should mark the
    /// ledger entry `Expired`. Not an error.
    AlreadyPast,
}

struct TimerHandle {
    fire_at: DateTime<Utc>,
    /// Flipped exactly once, by expiry or by cancel, never both.
    claimed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// In-memory registry of pending one-shot timers.
pub struct AlertScheduler {
    timers: Arc<Mutex<HashMap<AlertKey, TimerHandle>>>,
    ledger: Arc<NotificationLedger>,
    messenger: Arc<dyn Messenger>,
}

impl AlertScheduler {
    pub fn new(ledger: Arc<NotificationLedger>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            ledger,
            messenger,
        }
    }

    /// Register a one-shot timer for `key` at `fire_at`.
    ///
    /// Idempotent per key: a second call while a timer is registered is
    /// a no-op. A fire time at or before now registers nothing and
    /// returns [`ScheduleOutcome::AlreadyPast`].
    pub fn schedule(
        &self,
        key: AlertKey,
        fire_at: DateTime<Utc>,
        alert: AlertMessage,
    ) -> ScheduleOutcome {
        let now = Utc::now();
        if fire_at <= now {
            return ScheduleOutcome::AlreadyPast;
        }

        let mut timers = self.timers.lock().unwrap();
        if timers.contains_key(&key) {
            return ScheduleOutcome::AlreadyScheduled;
        }

        let claimed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(expire(
            Arc::clone(&self.timers),
            Arc::clone(&self.ledger),
            Arc::clone(&self.messenger),
            key.clone(),
            fire_at,
            alert,
            Arc::clone(&claimed),
        ));

        debug!(key = %key, fire_at = %fire_at, "alert timer registered");
        timers.insert(
            key,
            TimerHandle {
                fire_at,
                claimed,
                task,
            },
        );
        ScheduleOutcome::Scheduled
    }

    /// Cancel a pending timer. No-op if no timer exists for the key or
    /// the timer's expiry is already in flight.
    pub fn cancel(&self, key: &AlertKey) {
        let handle = self.timers.lock().unwrap().remove(key);
        if let Some(handle) = handle {
            if !handle.claimed.swap(true, Ordering::AcqRel) {
                handle.task.abort();
                info!(key = %key, "alert timer cancelled");
            }
        }
    }

    /// Cancel every pending timer belonging to one user. Opt-in hook
    /// for subscription-change handlers; nothing in the engine calls it.
    pub fn cancel_user(&self, user_id: &str) {
        let keys: Vec<AlertKey> = {
            let timers = self.timers.lock().unwrap();
            timers
                .keys()
                .filter(|k| k.user_id == user_id)
                .cloned()
                .collect()
        };
        for key in keys {
            self.cancel(&key);
        }
    }

    /// Fire time of the live timer for `key`, if one exists.
    pub fn fire_time(&self, key: &AlertKey) -> Option<DateTime<Utc>> {
        self.timers.lock().unwrap().get(key).map(|h| h.fire_at)
    }

    /// Number of live timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    /// Abort all timers. Used on process shutdown; pending entries are
    /// rebuilt from the ledger on the next start.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock().unwrap();
        let count = timers.len();
        for (_, handle) in timers.drain() {
            if !handle.claimed.swap(true, Ordering::AcqRel) {
                handle.task.abort();
            }
        }
        if count > 0 {
            info!(count, "scheduler shut down, timers aborted");
        }
    }
}

impl Drop for AlertScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The timer task body: sleep, claim, send, mark fired.
async fn expire(
    timers: Arc<Mutex<HashMap<AlertKey, TimerHandle>>>,
    ledger: Arc<NotificationLedger>,
    messenger: Arc<dyn Messenger>,
    key: AlertKey,
    fire_at: DateTime<Utc>,
    alert: AlertMessage,
    claimed: Arc<AtomicBool>,
) {
    let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(delay).await;

    // Claim the key before touching anything observable. Losing the
    // swap means a concurrent cancel got here first.
    if claimed.swap(true, Ordering::AcqRel) {
        return;
    }
    timers.lock().unwrap().remove(&key);

    let text = match alert.render() {
        Ok(text) => text,
        Err(e) => {
            // A broken template must not eat the alert.
            warn!(key = %key, error = %e, "alert template failed, sending fallback");
            format!("Load shedding will start soon for area {}.", alert.area)
        }
    };

    match messenger.send_text(&key.user_id, &text).await {
        Ok(()) => info!(key = %key, channel = messenger.channel_name(), "alert sent"),
        Err(e) => {
            // Fired regardless: delivery retry belongs to the gateway.
            warn!(key = %key, error = %e, "alert send failed, not retrying")
        }
    }

    if let Err(e) = ledger.mark_fired(&key).await {
        warn!(key = %key, error = %e, "failed to persist fired state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{alert, key_for, RecordingMessenger};
    use chrono::Duration;

    fn ledger(dir: &tempfile::TempDir) -> Arc<NotificationLedger> {
        Arc::new(NotificationLedger::open(&dir.path().join("ledger.json")).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_and_marks_fired() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = AlertScheduler::new(Arc::clone(&ledger), messenger.clone());

        let key = key_for("u1", 10);
        let fire_at = Utc::now() + Duration::minutes(5);
        ledger
            .insert_pending(&key, "capetown-7-gardens", fire_at)
            .await
            .unwrap();
        let outcome = scheduler.schedule(key.clone(), fire_at, alert(60));
        assert_eq!(outcome, ScheduleOutcome::Scheduled);
        assert_eq!(scheduler.fire_time(&key), Some(fire_at));

        messenger.wait_for_sends(1).await;
        // Paused clock: this only advances once every task is idle, so
        // the expiry task has finished its ledger write by then.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(messenger.sent_to("u1"), 1);
        assert_eq!(scheduler.pending_timers(), 0);
        assert_eq!(
            ledger.lookup(&key).await.unwrap().state,
            shed_core::AlertState::Fired
        );
    }

    #[tokio::test]
    async fn test_schedule_in_past_returns_already_past() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = AlertScheduler::new(ledger(&dir), messenger.clone());

        let outcome = scheduler.schedule(
            key_for("u1", 10),
            Utc::now() - Duration::seconds(1),
            alert(60),
        );
        assert_eq!(outcome, ScheduleOutcome::AlreadyPast);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_idempotent_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = AlertScheduler::new(ledger(&dir), messenger.clone());

        let key = key_for("u1", 10);
        let fire_at = Utc::now() + Duration::minutes(5);
        assert_eq!(
            scheduler.schedule(key.clone(), fire_at, alert(60)),
            ScheduleOutcome::Scheduled
        );
        assert_eq!(
            scheduler.schedule(key.clone(), fire_at, alert(60)),
            ScheduleOutcome::AlreadyScheduled
        );
        assert_eq!(scheduler.pending_timers(), 1);

        messenger.wait_for_sends(1).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(messenger.total_sends(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_send() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = AlertScheduler::new(ledger(&dir), messenger.clone());

        let key = key_for("u1", 10);
        scheduler.schedule(key.clone(), Utc::now() + Duration::minutes(5), alert(60));
        scheduler.cancel(&key);
        assert_eq!(scheduler.pending_timers(), 0);

        // Let virtual time run well past the fire time.
        tokio::time::sleep(std::time::Duration::from_secs(600)).await;
        assert_eq!(messenger.total_sends(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = AlertScheduler::new(Arc::clone(&ledger), messenger.clone());

        let key = key_for("u1", 10);
        let fire_at = Utc::now() + Duration::minutes(1);
        ledger
            .insert_pending(&key, "capetown-7-gardens", fire_at)
            .await
            .unwrap();
        scheduler.schedule(key.clone(), fire_at, alert(60));

        messenger.wait_for_sends(1).await;
        scheduler.cancel(&key);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(messenger.total_sends(), 1);
        assert_eq!(
            ledger.lookup(&key).await.unwrap().state,
            shed_core::AlertState::Fired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_user_only_touches_that_user() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = AlertScheduler::new(ledger(&dir), messenger.clone());

        let fire_at = Utc::now() + Duration::minutes(5);
        scheduler.schedule(key_for("u1", 10), fire_at, alert(60));
        scheduler.schedule(key_for("u1", 14), fire_at, alert(60));
        scheduler.schedule(key_for("u2", 10), fire_at, alert(60));

        scheduler.cancel_user("u1");
        assert_eq!(scheduler.pending_timers(), 1);
        assert!(scheduler.fire_time(&key_for("u2", 10)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_still_marks_fired() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let messenger = Arc::new(RecordingMessenger::failing());
        let scheduler = AlertScheduler::new(Arc::clone(&ledger), messenger.clone());

        let key = key_for("u1", 10);
        let fire_at = Utc::now() + Duration::minutes(1);
        ledger
            .insert_pending(&key, "capetown-7-gardens", fire_at)
            .await
            .unwrap();
        scheduler.schedule(key.clone(), fire_at, alert(60));

        messenger.wait_for_sends(1).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(
            ledger.lookup(&key).await.unwrap().state,
            shed_core::AlertState::Fired
        );
    }
}
