//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend`
//! trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Storage conventions
//!
//! - Timestamps are Unix epoch milliseconds (`INTEGER`)
//! - UUIDs and domain enums are `TEXT`
//! - Agent config documents and event details are JSON `TEXT`
//!
//! ## Limitations
//!
//! - **Concurrency**: Limited concurrent writes (fine for fleets up to a
//!   few hundred agents)
//! - **Distributed**: Single-machine only

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    Agent, BackupJob, BackupStatus, EventCategory, JobStats, Notification, Priority, SystemEvent,
};

use super::backend::{
    AgentConfig, AgentFilter, AgentSnapshot, EventFilter, HealthStatus, JobQuery, StorageBackend,
};
use super::error::{StorageError, StorageResult};

/// SQLite storage backend
///
/// Stores the full hub state (agents, jobs, events, notifications) in a
/// local SQLite database file.
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for optimal performance (WAL mode, etc.)
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn parse_uuid(value: &str) -> Result<Uuid, StorageError> {
        Uuid::parse_str(value)
            .map_err(|e| StorageError::SerializationError(format!("invalid uuid {value}: {e}")))
    }

    fn parse_enum<T: FromStr<Err = String>>(value: &str) -> Result<T, StorageError> {
        value.parse().map_err(StorageError::SerializationError)
    }

    fn agent_from_row(row: &SqliteRow) -> Result<Agent, StorageError> {
        Ok(Agent {
            agent_id: Self::parse_uuid(&row.get::<String, _>("agent_id"))?,
            hostname: row.get("hostname"),
            ip_address: row.get("ip_address"),
            os: row.get("os"),
            enabled: row.get::<i64, _>("enabled") != 0,
            last_seen: Self::millis_to_timestamp(row.get("last_seen")),
            config_hash: row.get("config_hash"),
            registered_at: Self::millis_to_timestamp(row.get("registered_at")),
        })
    }

    fn job_from_row(row: &SqliteRow) -> Result<BackupJob, StorageError> {
        Ok(BackupJob {
            job_id: Self::parse_uuid(&row.get::<String, _>("job_id"))?,
            agent_id: Self::parse_uuid(&row.get::<String, _>("agent_id"))?,
            status: Self::parse_enum(&row.get::<String, _>("status"))?,
            tool: row.get("tool"),
            source: row.get("source"),
            destination: row.get("destination"),
            size_bytes: row.get::<i64, _>("size_bytes") as u64,
            start_time: Self::millis_to_timestamp(row.get("start_time")),
            end_time: row
                .get::<Option<i64>, _>("end_time")
                .map(Self::millis_to_timestamp),
            error_message: row.get("error_message"),
            logs: row.get("logs"),
            created_at: Self::millis_to_timestamp(row.get("created_at")),
        })
    }

    fn event_from_row(row: &SqliteRow) -> Result<SystemEvent, StorageError> {
        let details = match row.get::<Option<String>, _>("details") {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                StorageError::SerializationError(format!("failed to deserialize details: {e}"))
            })?),
            None => None,
        };

        Ok(SystemEvent {
            event_id: Self::parse_uuid(&row.get::<String, _>("event_id"))?,
            category: Self::parse_enum(&row.get::<String, _>("category"))?,
            event_type: row.get("event_type"),
            description: row.get("description"),
            priority: Self::parse_enum(&row.get::<String, _>("priority"))?,
            agent_id: row
                .get::<Option<String>, _>("agent_id")
                .map(|s| Self::parse_uuid(&s))
                .transpose()?,
            backup_job_id: row
                .get::<Option<String>, _>("backup_job_id")
                .map(|s| Self::parse_uuid(&s))
                .transpose()?,
            related_id: row.get("related_id"),
            details,
            timestamp: Self::millis_to_timestamp(row.get("timestamp")),
        })
    }

    fn notification_from_row(row: &SqliteRow) -> Result<Notification, StorageError> {
        Ok(Notification {
            notification_id: Self::parse_uuid(&row.get::<String, _>("notification_id"))?,
            title: row.get("title"),
            message: row.get("message"),
            category: Self::parse_enum(&row.get::<String, _>("category"))?,
            priority: Self::parse_enum(&row.get::<String, _>("priority"))?,
            related_id: row.get("related_id"),
            read: row.get::<i64, _>("read") != 0,
            read_at: row
                .get::<Option<i64>, _>("read_at")
                .map(Self::millis_to_timestamp),
            timestamp: Self::millis_to_timestamp(row.get("timestamp")),
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip_all, fields(hostname = %candidate.hostname))]
    async fn upsert_agent(
        &self,
        candidate: Agent,
        default_config: AgentConfig,
    ) -> StorageResult<(Agent, bool)> {
        // Transaction so a concurrent registration for the same hostname
        // cannot create two agent rows.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let existing = sqlx::query("SELECT * FROM agents WHERE hostname = ?")
            .bind(&candidate.hostname)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if let Some(row) = existing {
            let mut agent = Self::agent_from_row(&row)?;
            agent.ip_address = candidate.ip_address;
            agent.os = candidate.os;
            agent.last_seen = candidate.last_seen;

            sqlx::query(
                "UPDATE agents SET ip_address = ?, os = ?, last_seen = ? WHERE agent_id = ?",
            )
            .bind(&agent.ip_address)
            .bind(&agent.os)
            .bind(Self::timestamp_to_millis(&agent.last_seen))
            .bind(agent.agent_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

            tx.commit()
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

            debug!("agent updated: {}", agent.hostname);
            return Ok((agent, false));
        }

        sqlx::query(
            r#"
            INSERT INTO agents (
                agent_id, hostname, ip_address, os, enabled,
                last_seen, config_hash, registered_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(candidate.agent_id.to_string())
        .bind(&candidate.hostname)
        .bind(&candidate.ip_address)
        .bind(&candidate.os)
        .bind(candidate.enabled as i64)
        .bind(Self::timestamp_to_millis(&candidate.last_seen))
        .bind(&candidate.config_hash)
        .bind(Self::timestamp_to_millis(&candidate.registered_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let config_json = serde_json::to_string(&default_config.config).map_err(|e| {
            StorageError::SerializationError(format!("failed to serialize config: {e}"))
        })?;

        sqlx::query(
            "INSERT INTO agent_configs (agent_id, config, config_hash, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(default_config.agent_id.to_string())
        .bind(config_json)
        .bind(&default_config.config_hash)
        .bind(Self::timestamp_to_millis(&default_config.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        debug!(
            "new agent created: {} ({})",
            candidate.hostname, candidate.agent_id
        );
        Ok((candidate, true))
    }

    async fn get_agent(&self, agent_id: Uuid) -> StorageResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.map(|r| Self::agent_from_row(&r)).transpose()
    }

    async fn get_agent_by_hostname(&self, hostname: &str) -> StorageResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE hostname = ?")
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.map(|r| Self::agent_from_row(&r)).transpose()
    }

    async fn list_agents(&self, filter: AgentFilter) -> StorageResult<Vec<Agent>> {
        let limit = if filter.limit == 0 {
            i64::MAX
        } else {
            filter.limit as i64
        };

        let rows = match filter.enabled {
            Some(enabled) => {
                sqlx::query(
                    "SELECT * FROM agents WHERE enabled = ? ORDER BY registered_at LIMIT ? OFFSET ?",
                )
                .bind(enabled as i64)
                .bind(limit)
                .bind(filter.offset as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM agents ORDER BY registered_at LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(filter.offset as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::agent_from_row).collect()
    }

    async fn touch_agent(&self, agent_id: Uuid, now: DateTime<Utc>) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE agents SET last_seen = ? WHERE agent_id = ?")
            .bind(Self::timestamp_to_millis(&now))
            .bind(agent_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_agent_enabled(&self, agent_id: Uuid, enabled: bool) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE agents SET enabled = ? WHERE agent_id = ?")
            .bind(enabled as i64)
            .bind(agent_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_agent_config(&self, config: AgentConfig) -> StorageResult<bool> {
        let config_json = serde_json::to_string(&config.config).map_err(|e| {
            StorageError::SerializationError(format!("failed to serialize config: {e}"))
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let updated = sqlx::query("UPDATE agents SET config_hash = ? WHERE agent_id = ?")
            .bind(&config.config_hash)
            .bind(config.agent_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO agent_configs (agent_id, config, config_hash, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (agent_id) DO UPDATE SET
                config = excluded.config,
                config_hash = excluded.config_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(config.agent_id.to_string())
        .bind(config_json)
        .bind(&config.config_hash)
        .bind(Self::timestamp_to_millis(&config.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(true)
    }

    async fn get_agent_config(&self, agent_id: Uuid) -> StorageResult<Option<AgentConfig>> {
        let row = sqlx::query("SELECT * FROM agent_configs WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let config_str: String = row.get("config");
        let config = serde_json::from_str(&config_str).map_err(|e| {
            StorageError::SerializationError(format!("failed to deserialize config: {e}"))
        })?;

        Ok(Some(AgentConfig {
            agent_id: Self::parse_uuid(&row.get::<String, _>("agent_id"))?,
            config,
            config_hash: row.get("config_hash"),
            updated_at: Self::millis_to_timestamp(row.get("updated_at")),
        }))
    }

    #[instrument(skip_all, fields(agent_id = %job.agent_id, status = %job.status))]
    async fn insert_job(&self, job: BackupJob) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO backup_jobs (
                job_id, agent_id, status, tool, source, destination,
                size_bytes, start_time, end_time, error_message, logs, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.job_id.to_string())
        .bind(job.agent_id.to_string())
        .bind(job.status.to_string())
        .bind(&job.tool)
        .bind(&job.source)
        .bind(&job.destination)
        .bind(job.size_bytes as i64)
        .bind(Self::timestamp_to_millis(&job.start_time))
        .bind(job.end_time.as_ref().map(Self::timestamp_to_millis))
        .bind(&job.error_message)
        .bind(&job.logs)
        .bind(Self::timestamp_to_millis(&job.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn query_jobs(&self, query: JobQuery) -> StorageResult<Vec<BackupJob>> {
        let mut sql = String::from("SELECT * FROM backup_jobs WHERE 1=1");
        if query.agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }
        if query.since.is_some() {
            sql.push_str(" AND start_time >= ?");
        }
        if query.recorded_since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY start_time DESC");
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql);
        if let Some(agent_id) = query.agent_id {
            q = q.bind(agent_id.to_string());
        }
        if let Some(since) = query.since {
            q = q.bind(Self::timestamp_to_millis(&since));
        }
        if let Some(since) = query.recorded_since {
            q = q.bind(Self::timestamp_to_millis(&since));
        }
        if let Some(status) = query.status {
            q = q.bind(status.to_string());
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::job_from_row).collect()
    }

    async fn count_jobs(
        &self,
        status: Option<BackupStatus>,
        agent_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM backup_jobs WHERE 1=1");
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }
        if since.is_some() {
            sql.push_str(" AND start_time >= ?");
        }

        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        if let Some(status) = status {
            q = q.bind(status.to_string());
        }
        if let Some(agent_id) = agent_id {
            q = q.bind(agent_id.to_string());
        }
        if let Some(since) = since {
            q = q.bind(Self::timestamp_to_millis(&since));
        }

        let (count,) = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(count as u64)
    }

    async fn sum_job_sizes(
        &self,
        agent_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<u64> {
        let mut sql = String::from("SELECT COALESCE(SUM(size_bytes), 0) FROM backup_jobs WHERE 1=1");
        if agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }
        if since.is_some() {
            sql.push_str(" AND start_time >= ?");
        }

        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        if let Some(agent_id) = agent_id {
            q = q.bind(agent_id.to_string());
        }
        if let Some(since) = since {
            q = q.bind(Self::timestamp_to_millis(&since));
        }

        let (total,) = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(total as u64)
    }

    async fn agent_snapshot(
        &self,
        agent_id: Uuid,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<AgentSnapshot>> {
        // Single transaction so the agent row, window jobs and all-time
        // totals come from one consistent state.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let agent_row = sqlx::query("SELECT * FROM agents WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let Some(agent_row) = agent_row else {
            return Ok(None);
        };
        let agent = Self::agent_from_row(&agent_row)?;

        let job_rows = sqlx::query(
            "SELECT * FROM backup_jobs WHERE agent_id = ? AND start_time >= ? ORDER BY start_time DESC",
        )
        .bind(agent_id.to_string())
        .bind(Self::timestamp_to_millis(&since))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let window_jobs = job_rows
            .iter()
            .map(Self::job_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let (total, success, failed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'success'), 0),
                   COALESCE(SUM(status = 'failed'), 0)
            FROM backup_jobs WHERE agent_id = ?
            "#,
        )
        .bind(agent_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(Some(AgentSnapshot {
            agent,
            window_jobs,
            totals: JobStats {
                total: total as u64,
                success: success as u64,
                failed: failed as u64,
            },
        }))
    }

    async fn insert_event(&self, event: SystemEvent) -> StorageResult<()> {
        let details_json = event
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| {
                StorageError::SerializationError(format!("failed to serialize details: {e}"))
            })?;

        sqlx::query(
            r#"
            INSERT INTO system_events (
                event_id, category, event_type, description, priority,
                agent_id, backup_job_id, related_id, details, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.event_id.to_string())
        .bind(event.category.to_string())
        .bind(&event.event_type)
        .bind(&event.description)
        .bind(event.priority.to_string())
        .bind(event.agent_id.map(|id| id.to_string()))
        .bind(event.backup_job_id.map(|id| id.to_string()))
        .bind(&event.related_id)
        .bind(details_json)
        .bind(Self::timestamp_to_millis(&event.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn query_events(&self, filter: EventFilter) -> StorageResult<Vec<SystemEvent>> {
        let mut sql = String::from("SELECT * FROM system_events WHERE 1=1");
        if filter.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if filter.priority.is_some() {
            sql.push_str(" AND priority = ?");
        }
        if filter.agent_id.is_some() {
            sql.push_str(" AND agent_id = ?");
        }
        if filter.since.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

        let limit = if filter.limit == 0 {
            i64::MAX
        } else {
            filter.limit as i64
        };

        let mut q = sqlx::query(&sql);
        if let Some(category) = filter.category {
            q = q.bind(category.to_string());
        }
        if let Some(priority) = filter.priority {
            q = q.bind(priority.to_string());
        }
        if let Some(agent_id) = filter.agent_id {
            q = q.bind(agent_id.to_string());
        }
        if let Some(since) = filter.since {
            q = q.bind(Self::timestamp_to_millis(&since));
        }
        q = q.bind(limit).bind(filter.offset as i64);

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::event_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_events(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let result = sqlx::query("DELETE FROM system_events WHERE timestamp < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let deleted = result.rows_affected() as usize;
        if deleted > 0 {
            info!("deleted {} old events", deleted);
        }
        Ok(deleted)
    }

    async fn insert_notification(&self, notification: Notification) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                notification_id, title, message, category, priority,
                related_id, read, read_at, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.notification_id.to_string())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.category.to_string())
        .bind(notification.priority.to_string())
        .bind(&notification.related_id)
        .bind(notification.read as i64)
        .bind(notification.read_at.as_ref().map(Self::timestamp_to_millis))
        .bind(Self::timestamp_to_millis(&notification.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> StorageResult<Vec<Notification>> {
        let limit = if limit == 0 { i64::MAX } else { limit as i64 };

        let sql = if unread_only {
            "SELECT * FROM notifications WHERE read = 0 ORDER BY timestamp DESC LIMIT ?"
        } else {
            "SELECT * FROM notifications ORDER BY timestamp DESC LIMIT ?"
        };

        let rows = sqlx::query(sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::notification_from_row).collect()
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let result =
            sqlx::query("UPDATE notifications SET read = 1, read_at = ? WHERE notification_id = ?")
                .bind(Self::timestamp_to_millis(&now))
                .bind(notification_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_notifications(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let result = sqlx::query("DELETE FROM notifications WHERE timestamp < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let deleted = result.rows_affected() as usize;
        if deleted > 0 {
            info!("deleted {} old notifications", deleted);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (agents,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let (jobs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM backup_jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let (events,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM system_events")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let file_size_mb = file_size as f64 / 1_000_000.0;

        Ok(format!(
            "SQLite: {} agents, {} jobs, {} events, {:.2} MB on disk",
            agents, jobs, events, file_size_mb
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
