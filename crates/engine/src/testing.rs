//! In-process test doubles shared by the engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{Duration, TimeZone, Utc};

use shed_core::{AlertKey, OutageWindow, WindowId};
use shed_notify::{AlertMessage, Messenger, NotifyError};
use shed_source::{OutageSource, SourceError};

pub(crate) const TEST_AREA: &str = "capetown-7-gardens";

/// Key for a window in `TEST_AREA` starting at the given hour on a
/// fixed test date.
pub(crate) fn key_for(user: &str, start_hour: u32) -> AlertKey {
    let start = Utc.with_ymd_and_hms(2025, 1, 10, start_hour, 0, 0).unwrap();
    AlertKey::new(user, WindowId::derive(TEST_AREA, start, start + Duration::hours(2)))
}

pub(crate) fn alert(lead_time_minutes: u64) -> AlertMessage {
    AlertMessage {
        area: TEST_AREA.to_string(),
        start: Utc::now() + Duration::hours(2),
        end: None,
        lead_time_minutes,
    }
}

// ── Messenger double ─────────────────────────────────────────────────

/// Records every send; optionally fails each one after recording it.
#[derive(Default)]
pub(crate) struct RecordingMessenger {
    sends: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMessenger {
    pub(crate) fn failing() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn total_sends(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub(crate) fn sent_to(&self, user_id: &str) -> usize {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == user_id)
            .count()
    }

    pub(crate) fn last_body(&self) -> Option<String> {
        self.sends.lock().unwrap().last().map(|(_, b)| b.clone())
    }

    /// Wait until at least `n` sends were attempted. Polls in 1s steps;
    /// under a paused clock each step auto-advances once all tasks are
    /// idle, so hour-scale timers resolve in a few thousand iterations.
    pub(crate) async fn wait_for_sends(&self, n: usize) {
        for _ in 0..10_000 {
            if self.total_sends() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
        panic!("timed out waiting for {} sends", n);
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, user_id: &str, message: &str) -> Result<(), NotifyError> {
        self.sends
            .lock()
            .unwrap()
            .push((user_id.to_string(), message.to_string()));
        if self.fail {
            return Err(NotifyError::Status { status: 502 });
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

// ── Outage source double ─────────────────────────────────────────────

/// Canned per-area windows, with optional per-area failures and a
/// fetch counter per area.
#[derive(Default)]
pub(crate) struct CannedSource {
    windows: Mutex<HashMap<String, Vec<OutageWindow>>>,
    failing_areas: Mutex<HashSet<String>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl CannedSource {
    pub(crate) fn set_windows(&self, area: &str, windows: Vec<OutageWindow>) {
        self.windows
            .lock()
            .unwrap()
            .insert(area.to_string(), windows);
    }

    pub(crate) fn fail_area(&self, area: &str) {
        self.failing_areas.lock().unwrap().insert(area.to_string());
    }

    pub(crate) fn fetches(&self, area: &str) -> usize {
        self.fetches.lock().unwrap().get(area).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl OutageSource for CannedSource {
    async fn fetch_windows(&self, area: &str) -> Result<Vec<OutageWindow>, SourceError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(area.to_string())
            .or_insert(0) += 1;

        if self.failing_areas.lock().unwrap().contains(area) {
            return Err(SourceError::Timeout { timeout_secs: 10 });
        }
        Ok(self
            .windows
            .lock()
            .unwrap()
            .get(area)
            .cloned()
            .unwrap_or_default())
    }

    async fn fuzzy_search(&self, _query: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.windows.lock().unwrap().keys().cloned().collect())
    }

    async fn list_areas(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.windows.lock().unwrap().keys().cloned().collect())
    }
}
