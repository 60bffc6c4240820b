//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement. The hub treats storage as a
//! record store with predicate filtering and ordering; all domain logic
//! (validation, health scoring, alerting) lives above this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Agent, BackupJob, BackupStatus, EventCategory, JobStats, Notification, Priority,
    SystemEvent};

use super::error::StorageResult;

/// Filter for listing agents. Results are in insertion order.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    /// Restrict to enabled/disabled agents; `None` returns all
    pub enabled: Option<bool>,

    /// Pagination offset
    pub offset: usize,

    /// Maximum number of results (0 means unbounded)
    pub limit: usize,
}

/// Filter for querying backup jobs. Results are ordered by start time,
/// newest first.
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub agent_id: Option<Uuid>,
    /// Filter on run start time
    pub since: Option<DateTime<Utc>>,
    /// Filter on recording time, independent of when the run started
    pub recorded_since: Option<DateTime<Utc>>,
    pub status: Option<BackupStatus>,
    pub limit: Option<usize>,
}

/// Filter for querying system events. Results are ordered by timestamp,
/// newest first.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub priority: Option<Priority>,
    pub agent_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: usize,
}

/// Stored per-agent configuration alongside its content hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AgentConfig {
    pub agent_id: Uuid,
    pub config: serde_json::Value,
    pub config_hash: String,
    pub updated_at: DateTime<Utc>,
}

/// Consistent per-agent read snapshot for the health evaluator.
///
/// `window_jobs` holds jobs with `start_time >= since`; `totals` holds
/// all-time counts. Both are captured under a single read lock or
/// transaction so the evaluator never sees a half-updated view.
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub agent: Agent,
    pub window_jobs: Vec<BackupJob>,
    pub totals: JobStats,
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// Implementations must be `Send + Sync` as they are shared across async
/// tasks. Methods return `StorageResult<T>`; implementations convert
/// backend-specific errors to `StorageError` variants and never retry on
/// their own.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========================================================================
    // Agent records
    // ========================================================================

    /// Upsert an agent keyed by hostname, atomically.
    ///
    /// If the hostname is unknown, `candidate` is inserted as-is together
    /// with its `default_config` record and `(candidate, true)` is returned.
    /// If the hostname already exists, the existing record's address, OS and
    /// `last_seen` are updated from the candidate and `(existing, false)` is
    /// returned; the existing `agent_id` and config are untouched.
    async fn upsert_agent(
        &self,
        candidate: Agent,
        default_config: AgentConfig,
    ) -> StorageResult<(Agent, bool)>;

    async fn get_agent(&self, agent_id: Uuid) -> StorageResult<Option<Agent>>;

    async fn get_agent_by_hostname(&self, hostname: &str) -> StorageResult<Option<Agent>>;

    async fn list_agents(&self, filter: AgentFilter) -> StorageResult<Vec<Agent>>;

    /// Advance `last_seen` for a known agent. Returns `false` for unknown
    /// agents; heartbeats from unregistered agents are non-fatal no-ops.
    async fn touch_agent(&self, agent_id: Uuid, now: DateTime<Utc>) -> StorageResult<bool>;

    async fn set_agent_enabled(&self, agent_id: Uuid, enabled: bool) -> StorageResult<bool>;

    /// Replace the stored configuration and hash for a known agent.
    async fn set_agent_config(&self, config: AgentConfig) -> StorageResult<bool>;

    async fn get_agent_config(&self, agent_id: Uuid) -> StorageResult<Option<AgentConfig>>;

    // ========================================================================
    // Backup jobs (append-only)
    // ========================================================================

    async fn insert_job(&self, job: BackupJob) -> StorageResult<()>;

    async fn query_jobs(&self, query: JobQuery) -> StorageResult<Vec<BackupJob>>;

    async fn count_jobs(
        &self,
        status: Option<BackupStatus>,
        agent_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<u64>;

    async fn sum_job_sizes(
        &self,
        agent_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<u64>;

    /// Capture agent + window jobs + all-time stats in one consistent read.
    /// Returns `None` for unknown agents.
    async fn agent_snapshot(
        &self,
        agent_id: Uuid,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<AgentSnapshot>>;

    // ========================================================================
    // System events
    // ========================================================================

    async fn insert_event(&self, event: SystemEvent) -> StorageResult<()>;

    async fn query_events(&self, filter: EventFilter) -> StorageResult<Vec<SystemEvent>>;

    /// Delete events older than the given timestamp; returns the count.
    async fn cleanup_old_events(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    // ========================================================================
    // Notifications
    // ========================================================================

    async fn insert_notification(&self, notification: Notification) -> StorageResult<()>;

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> StorageResult<Vec<Notification>>;

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Delete notifications older than the given timestamp; returns the count.
    async fn cleanup_old_notifications(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Lightweight operational check (ping database, count records).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable backend statistics.
    async fn get_stats(&self) -> StorageResult<String>;

    /// Gracefully shut down the backend and flush pending writes.
    async fn close(&self) -> StorageResult<()>;
}
