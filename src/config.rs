use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./custodia.db")
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    /// Liveness / health thresholds
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Record retention policy
    #[serde(default)]
    pub retention: Retention,

    /// Webhook endpoint for outbound notifications
    pub webhook: Option<Webhook>,

    /// API bind address (defaults to 127.0.0.1:9200)
    pub listen: Option<SocketAddr>,
}

/// Thresholds driving the liveness and health evaluation.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Thresholds {
    /// Maximum silence before an agent is classified offline (τ)
    #[serde(default = "default_liveness_timeout_minutes")]
    pub liveness_timeout_minutes: u64,

    /// Silence duration after which the `not_reporting` issue fires
    #[serde(default = "default_not_reporting_minutes")]
    pub not_reporting_minutes: u64,

    /// Lookback window for success rate and duration metrics
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,

    /// Interval between evaluation ticks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Per-agent evaluation timeout within a tick
    #[serde(default = "default_agent_eval_timeout_secs")]
    pub agent_eval_timeout_secs: u64,

    /// Nominal storage capacity for the system overview, in GB
    #[serde(default = "default_storage_capacity_gb")]
    pub storage_capacity_gb: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            liveness_timeout_minutes: default_liveness_timeout_minutes(),
            not_reporting_minutes: default_not_reporting_minutes(),
            lookback_days: default_lookback_days(),
            tick_secs: default_tick_secs(),
            agent_eval_timeout_secs: default_agent_eval_timeout_secs(),
            storage_capacity_gb: default_storage_capacity_gb(),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Retention {
    /// Events older than this are purged (days)
    #[serde(default = "default_event_retention_days")]
    pub event_days: u32,

    /// Notifications older than this are purged (days)
    #[serde(default = "default_notification_retention_days")]
    pub notification_days: u32,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            event_days: default_event_retention_days(),
            notification_days: default_notification_retention_days(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

fn default_liveness_timeout_minutes() -> u64 {
    15
}

fn default_not_reporting_minutes() -> u64 {
    60
}

fn default_lookback_days() -> u64 {
    7
}

fn default_tick_secs() -> u64 {
    60
}

fn default_agent_eval_timeout_secs() -> u64 {
    10
}

fn default_storage_capacity_gb() -> f64 {
    1000.0
}

fn default_event_retention_days() -> u32 {
    90
}

fn default_notification_retention_days() -> u32 {
    30
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
