//! OutageSource trait definition.

use shed_core::OutageWindow;

use crate::error::SourceError;

/// Trait for outage-data backends.
///
/// `fetch_windows` is the only operation the scheduling engine consumes.
/// The other two exist for the command layer (area discovery).
#[async_trait::async_trait]
pub trait OutageSource: Send + Sync {
    /// Current set of known outage windows for an area.
    async fn fetch_windows(&self, area: &str) -> Result<Vec<OutageWindow>, SourceError>;

    /// Fuzzy-match area names against a free-text query.
    async fn fuzzy_search(&self, query: &str) -> Result<Vec<String>, SourceError>;

    /// All area names the source knows about.
    async fn list_areas(&self) -> Result<Vec<String>, SourceError>;
}
