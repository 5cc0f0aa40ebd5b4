//! Domain types shared across the workspace.
//!
//! The central identity is [`WindowId`]: the outage source re-reports the
//! same windows verbatim on every poll, so deduplication keys off a stable
//! digest of `(area, start, end)` rather than anything source-assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A user's active area subscription. One area per user; a later
/// subscribe overwrites the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    pub area: String,
}

/// A reported interval during which power is expected to be off for an area.
///
/// Immutable once observed. The source may report the same window on every
/// poll; identity for dedup purposes is [`OutageWindow::window_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageWindow {
    pub area: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OutageWindow {
    /// Deterministic identity for this window, stable across polls.
    pub fn window_id(&self) -> WindowId {
        WindowId::derive(&self.area, self.start, self.end)
    }
}

/// Deterministic outage-window identity derived from `(area, start, end)`.
///
/// SHA-256 over a canonical `area|start|end` string (RFC 3339 timestamps),
/// truncated to 16 hex chars. Collisions at this scale (thousands of
/// windows) are not a practical concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    pub fn derive(area: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let canonical = format!("{}|{}|{}", area, start.to_rfc3339(), end.to_rfc3339());
        let digest = Sha256::digest(canonical.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        WindowId(hex[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The dedup key: one alert per (user, window) pair, ever.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub user_id: String,
    pub window_id: WindowId,
}

impl AlertKey {
    pub fn new(user_id: impl Into<String>, window_id: WindowId) -> Self {
        Self {
            user_id: user_id.into(),
            window_id,
        }
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.user_id, self.window_id)
    }
}

/// Lifecycle of a ledger entry. Transitions are strictly
/// `Pending -> Fired` or `Pending -> Expired`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertState {
    /// Scheduled; a live timer exists for this entry.
    Pending,
    /// The alert send was attempted (delivery is the gateway's problem).
    Fired,
    /// The fire time had already passed when the window was discovered,
    /// or elapsed while the process was down.
    Expired,
}

/// Durable record of one (user, window) alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: String,
    pub window_id: WindowId,
    pub area: String,
    pub state: AlertState,
    pub scheduled_fire_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.user_id.clone(), self.window_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(area: &str, start_h: u32) -> OutageWindow {
        OutageWindow {
            area: area.to_string(),
            start: Utc.with_ymd_and_hms(2025, 1, 10, start_h, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 1, 10, start_h + 2, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_window_id_deterministic() {
        let a = window("capetown-7-gardens", 10);
        let b = window("capetown-7-gardens", 10);
        assert_eq!(a.window_id(), b.window_id());
    }

    #[test]
    fn test_window_id_distinguishes_area_and_interval() {
        let base = window("capetown-7-gardens", 10);
        assert_ne!(base.window_id(), window("jhb-4-sandton", 10).window_id());
        assert_ne!(base.window_id(), window("capetown-7-gardens", 12).window_id());
    }

    #[test]
    fn test_window_id_is_16_hex_chars() {
        let id = window("a", 10).window_id();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_alert_key_display_roundtrips_in_map_keys() {
        let key = AlertKey::new("u1", window("a", 10).window_id());
        let s = key.to_string();
        assert!(s.starts_with("u1|"));
    }

    #[test]
    fn test_ledger_entry_serde() {
        let w = window("capetown-7-gardens", 10);
        let entry = LedgerEntry {
            user_id: "u1".to_string(),
            window_id: w.window_id(),
            area: w.area.clone(),
            state: AlertState::Pending,
            scheduled_fire_at: w.start - chrono::Duration::hours(1),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
