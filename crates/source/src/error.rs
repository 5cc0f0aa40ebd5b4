use thiserror::Error;

/// Errors from the outage data source.
///
/// All variants are treated identically by the reconciler: the affected
/// area is skipped for the current cycle and retried on the next one.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}
