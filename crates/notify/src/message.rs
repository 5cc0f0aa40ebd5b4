//! Minijinja rendering for the alert message body.
//!
//! The template is a fixed string (not user-supplied), so a fresh
//! [`minijinja::Environment`] per render is cheap enough and keeps the
//! renderer stateless.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::traits::NotifyError;

const ALERT_TEMPLATE: &str = "Load shedding will start in {{ lead }} for area {{ area }} \
(from {{ start }} until {{ end }}).";

/// Context for one scheduled alert, rendered just before sending.
#[derive(Debug, Clone, Serialize)]
pub struct AlertMessage {
    pub area: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub lead_time_minutes: u64,
}

impl AlertMessage {
    /// Render the human-readable alert text.
    pub fn render(&self) -> Result<String, NotifyError> {
        let env = minijinja::Environment::new();
        let ctx = minijinja::context! {
            area => self.area,
            lead => humanize_minutes(self.lead_time_minutes),
            start => self.start.format("%H:%M UTC on %d %b").to_string(),
            end => self
                .end
                .map(|e| e.format("%H:%M UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        };
        env.render_str(ALERT_TEMPLATE, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

/// "60" -> "one hour", "90" -> "90 minutes". Whole hours read better
/// in an alert than raw minute counts.
fn humanize_minutes(minutes: u64) -> String {
    match minutes {
        60 => "one hour".to_string(),
        m if m % 60 == 0 && m > 0 => format!("{} hours", m / 60),
        m => format!("{} minutes", m),
    }
}
