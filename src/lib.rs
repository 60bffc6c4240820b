pub mod actors;
pub mod api;
pub mod config;
pub mod events;
pub mod health;
pub mod ledger;
pub mod notify;
pub mod registry;
pub mod stats;
pub mod storage;
pub mod tips;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A remote host running backup jobs and reporting status to the hub.
///
/// Created on first registration from a previously-unseen hostname.
/// `agent_id` is stable once issued; hostname maps to at most one agent.
/// Agents are never hard-deleted, disabling is the only removal path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: Uuid,
    pub hostname: String,
    pub ip_address: String,
    pub os: String,
    pub enabled: bool,
    pub last_seen: DateTime<Utc>,
    pub config_hash: String,
    pub registered_at: DateTime<Utc>,
}

/// Outcome of one reported backup run. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupJob {
    pub job_id: Uuid,
    pub agent_id: Uuid,
    pub status: BackupStatus,
    pub tool: String,
    pub source: String,
    pub destination: String,
    pub size_bytes: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub logs: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BackupJob {
    /// Wall-clock duration in seconds, if the job has finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

/// Fields an agent submits when reporting a backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBackupJob {
    pub status: BackupStatus,
    pub tool: String,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub size_bytes: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub logs: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Running,
    Success,
    Failed,
    Warning,
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupStatus::Running => write!(f, "running"),
            BackupStatus::Success => write!(f, "success"),
            BackupStatus::Failed => write!(f, "failed"),
            BackupStatus::Warning => write!(f, "warning"),
        }
    }
}

impl std::str::FromStr for BackupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(BackupStatus::Running),
            "success" => Ok(BackupStatus::Success),
            "failed" => Ok(BackupStatus::Failed),
            "warning" => Ok(BackupStatus::Warning),
            other => Err(format!("unknown backup status: {other}")),
        }
    }
}

/// Event priority. Ordering follows severity, so `p >= Priority::High`
/// selects the alerting tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Agent,
    Backup,
    System,
    Security,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Agent => write!(f, "agent"),
            EventCategory::Backup => write!(f, "backup"),
            EventCategory::System => write!(f, "system"),
            EventCategory::Security => write!(f, "security"),
        }
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(EventCategory::Agent),
            "backup" => Ok(EventCategory::Backup),
            "system" => Ok(EventCategory::System),
            "security" => Ok(EventCategory::Security),
            other => Err(format!("unknown event category: {other}")),
        }
    }
}

/// A recorded system event. The `(category, event_type)` pair is validated
/// against a fixed vocabulary at creation time (see `events`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub event_id: Uuid,
    pub category: EventCategory,
    pub event_type: String,
    pub description: String,
    pub priority: Priority,
    pub agent_id: Option<Uuid>,
    pub backup_job_id: Option<Uuid>,
    pub related_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Operator-facing record derived from high-priority events and tips.
/// Mutated only by the read/unread transition; purged by age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: EventCategory,
    pub priority: Priority,
    pub related_id: Option<String>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// All-time job counts for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

// === Wire types shared between the hub API and the agent binary ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub hostname: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub os: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub agent_id: Uuid,
    pub config_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportJobResponse {
    pub job_id: Uuid,
}
