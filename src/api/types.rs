//! Request and response bodies for the REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::health::HealthSnapshot;
use crate::{Agent, BackupStatus};

/// GET /api/v1/health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    /// One-line backend figures (record counts, on-disk size)
    pub storage_stats: String,
    pub timestamp: String,
}

/// Query parameters for listing agents
#[derive(Debug, Default, Deserialize)]
pub struct AgentListQuery {
    pub enabled: Option<bool>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

/// Query parameters for backup history
#[derive(Debug, Deserialize)]
pub struct BackupListQuery {
    /// Restrict to jobs started within the last N days
    pub days: Option<u64>,
    pub status: Option<BackupStatus>,
    pub limit: Option<usize>,
}

/// Query parameters for the event feed
#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub category: Option<crate::EventCategory>,
    pub priority: Option<crate::Priority>,
    pub agent_id: Option<Uuid>,
    /// Lookback in days (default 7)
    pub days: Option<u64>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

/// Query parameters for the notification feed
#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<usize>,
}

/// PUT /api/v1/agents/{id}/config request body
#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    pub config: serde_json::Value,
}

/// POST /api/v1/agents/{id}/enabled request body
#[derive(Debug, Serialize, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// GET /api/v1/agents/{id}/health response
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentHealthResponse {
    pub agent_id: Uuid,
    pub hostname: String,
    pub last_seen: DateTime<Utc>,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

/// Agent list entry with liveness resolved at request time
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(flatten)]
    pub agent: Agent,
    pub online: bool,
}
