use std::env;
use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub source: SourceConfig,
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            storage: StorageConfig::from_env(),
            source: SourceConfig::from_env(),
            engine: EngineConfig::from_env(),
            gateway: GatewayConfig::from_env(),
            server: ServerConfig::from_env(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Where the subscription and ledger documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("SHED_DATA_DIR", "./data")),
        }
    }

    pub fn subscriptions_path(&self) -> PathBuf {
        self.data_dir.join("subscriptions.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }
}

// ── Outage source ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the eskom-calendar API.
    pub base_url: String,
    /// Per-request timeout; exceeding it counts as a fetch failure.
    pub timeout_secs: u64,
    /// Max areas fetched concurrently during one reconciliation pass.
    pub fetch_concurrency: usize,
}

impl SourceConfig {
    fn from_env() -> Self {
        Self {
            base_url: env_or(
                "SHED_SOURCE_BASE_URL",
                "https://eskom-calendar-api.shuttleapp.rs",
            ),
            timeout_secs: env_u64("SHED_SOURCE_TIMEOUT_SECS", 10),
            fetch_concurrency: env_u64("SHED_SOURCE_FETCH_CONCURRENCY", 4) as usize,
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minutes before a window's start at which the alert fires.
    pub lead_time_minutes: u64,
    /// Seconds between reconciliation passes. Keep well below the lead
    /// time or freshly published windows will expire unseen.
    pub reconcile_interval_secs: u64,
}

impl EngineConfig {
    fn from_env() -> Self {
        Self {
            lead_time_minutes: env_u64("SHED_LEAD_TIME_MINUTES", 60),
            reconcile_interval_secs: env_u64("SHED_RECONCILE_INTERVAL_SECS", 300),
        }
    }

    pub fn lead_time(&self) -> Duration {
        Duration::minutes(self.lead_time_minutes as i64)
    }
}

// ── Messaging gateway ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Outbound send endpoint of the messaging gateway.
    pub send_url: Option<String>,
    /// Bearer token for the gateway, if it requires one.
    pub token: Option<String>,
}

impl GatewayConfig {
    fn from_env() -> Self {
        Self {
            send_url: env_opt("SHED_GATEWAY_SEND_URL"),
            token: env_opt("SHED_GATEWAY_TOKEN"),
        }
    }
}

// ── HTTP server ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            bind_addr: env_or("SHED_BIND_ADDR", "0.0.0.0:8080"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Not touching process env here; just exercise the defaults path
        // via explicit construction.
        let engine = EngineConfig {
            lead_time_minutes: 60,
            reconcile_interval_secs: 300,
        };
        assert_eq!(engine.lead_time(), Duration::hours(1));
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/tmp/shed"),
        };
        assert_eq!(
            storage.subscriptions_path(),
            PathBuf::from("/tmp/shed/subscriptions.json")
        );
        assert_eq!(storage.ledger_path(), PathBuf::from("/tmp/shed/ledger.json"));
    }
}
