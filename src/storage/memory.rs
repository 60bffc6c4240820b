//! In-memory storage backend (no persistence)
//!
//! All records live in a single `RwLock`-guarded structure. Writes take the
//! lock exclusively, which gives the per-agent atomicity the hub requires:
//! two concurrent heartbeats for the same agent cannot interleave into a
//! torn `last_seen` write, and `agent_snapshot` sees a consistent view.
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Linear scans**: Fine for the fleet sizes this backend targets
//!   (tests, demos, ephemeral deployments)

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{Agent, BackupJob, BackupStatus, JobStats, Notification, SystemEvent};

use super::backend::{
    AgentConfig, AgentFilter, AgentSnapshot, EventFilter, HealthStatus, JobQuery, StorageBackend,
};
use super::error::StorageResult;

#[derive(Debug, Default)]
struct MemoryInner {
    /// Agents in insertion order; hostname uniqueness is enforced on upsert
    agents: Vec<Agent>,

    /// Per-agent configuration records
    configs: HashMap<Uuid, AgentConfig>,

    /// Append-only job log
    jobs: Vec<BackupJob>,

    events: Vec<SystemEvent>,

    notifications: Vec<Notification>,
}

impl MemoryInner {
    fn agent_mut(&mut self, agent_id: Uuid) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.agent_id == agent_id)
    }

    fn agent(&self, agent_id: Uuid) -> Option<&Agent> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    fn job_totals(&self, agent_id: Uuid) -> JobStats {
        let mut totals = JobStats::default();
        for job in self.jobs.iter().filter(|j| j.agent_id == agent_id) {
            totals.total += 1;
            match job.status {
                BackupStatus::Success => totals.success += 1,
                BackupStatus::Failed => totals.failed += 1,
                _ => {}
            }
        }
        totals
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: RwLock<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn upsert_agent(
        &self,
        candidate: Agent,
        default_config: AgentConfig,
    ) -> StorageResult<(Agent, bool)> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .agents
            .iter_mut()
            .find(|a| a.hostname == candidate.hostname)
        {
            existing.ip_address = candidate.ip_address;
            existing.os = candidate.os;
            existing.last_seen = candidate.last_seen;
            let updated = existing.clone();
            debug!("agent updated: {}", updated.hostname);
            return Ok((updated, false));
        }

        debug!(
            "new agent created: {} ({})",
            candidate.hostname, candidate.agent_id
        );
        inner.configs.insert(candidate.agent_id, default_config);
        inner.agents.push(candidate.clone());
        Ok((candidate, true))
    }

    async fn get_agent(&self, agent_id: Uuid) -> StorageResult<Option<Agent>> {
        let inner = self.inner.read().await;
        Ok(inner.agent(agent_id).cloned())
    }

    async fn get_agent_by_hostname(&self, hostname: &str) -> StorageResult<Option<Agent>> {
        let inner = self.inner.read().await;
        Ok(inner.agents.iter().find(|a| a.hostname == hostname).cloned())
    }

    async fn list_agents(&self, filter: AgentFilter) -> StorageResult<Vec<Agent>> {
        let inner = self.inner.read().await;
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };

        Ok(inner
            .agents
            .iter()
            .filter(|a| filter.enabled.is_none_or(|wanted| a.enabled == wanted))
            .skip(filter.offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn touch_agent(&self, agent_id: Uuid, now: DateTime<Utc>) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.agent_mut(agent_id) {
            Some(agent) => {
                agent.last_seen = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_agent_enabled(&self, agent_id: Uuid, enabled: bool) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.agent_mut(agent_id) {
            Some(agent) => {
                agent.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_agent_config(&self, config: AgentConfig) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;

        let hash = config.config_hash.clone();
        match inner.agent_mut(config.agent_id) {
            Some(agent) => {
                agent.config_hash = hash;
            }
            None => return Ok(false),
        }

        inner.configs.insert(config.agent_id, config);
        Ok(true)
    }

    async fn get_agent_config(&self, agent_id: Uuid) -> StorageResult<Option<AgentConfig>> {
        let inner = self.inner.read().await;
        Ok(inner.configs.get(&agent_id).cloned())
    }

    async fn insert_job(&self, job: BackupJob) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.jobs.push(job);
        Ok(())
    }

    async fn query_jobs(&self, query: JobQuery) -> StorageResult<Vec<BackupJob>> {
        let inner = self.inner.read().await;

        let mut jobs: Vec<BackupJob> = inner
            .jobs
            .iter()
            .filter(|j| query.agent_id.is_none_or(|id| j.agent_id == id))
            .filter(|j| query.since.is_none_or(|since| j.start_time >= since))
            .filter(|j| query.recorded_since.is_none_or(|since| j.created_at >= since))
            .filter(|j| query.status.is_none_or(|status| j.status == status))
            .cloned()
            .collect();

        jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if let Some(limit) = query.limit {
            jobs.truncate(limit);
        }

        Ok(jobs)
    }

    async fn count_jobs(
        &self,
        status: Option<BackupStatus>,
        agent_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<u64> {
        let inner = self.inner.read().await;

        Ok(inner
            .jobs
            .iter()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .filter(|j| agent_id.is_none_or(|id| j.agent_id == id))
            .filter(|j| since.is_none_or(|s| j.start_time >= s))
            .count() as u64)
    }

    async fn sum_job_sizes(
        &self,
        agent_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<u64> {
        let inner = self.inner.read().await;

        Ok(inner
            .jobs
            .iter()
            .filter(|j| agent_id.is_none_or(|id| j.agent_id == id))
            .filter(|j| since.is_none_or(|s| j.start_time >= s))
            .map(|j| j.size_bytes)
            .sum())
    }

    async fn agent_snapshot(
        &self,
        agent_id: Uuid,
        since: DateTime<Utc>,
    ) -> StorageResult<Option<AgentSnapshot>> {
        let inner = self.inner.read().await;

        let Some(agent) = inner.agent(agent_id).cloned() else {
            return Ok(None);
        };

        let mut window_jobs: Vec<BackupJob> = inner
            .jobs
            .iter()
            .filter(|j| j.agent_id == agent_id && j.start_time >= since)
            .cloned()
            .collect();
        window_jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        Ok(Some(AgentSnapshot {
            totals: inner.job_totals(agent_id),
            agent,
            window_jobs,
        }))
    }

    async fn insert_event(&self, event: SystemEvent) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.events.push(event);
        Ok(())
    }

    async fn query_events(&self, filter: EventFilter) -> StorageResult<Vec<SystemEvent>> {
        let inner = self.inner.read().await;
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };

        let mut events: Vec<SystemEvent> = inner
            .events
            .iter()
            .filter(|e| filter.category.is_none_or(|c| e.category == c))
            .filter(|e| filter.priority.is_none_or(|p| e.priority == p))
            .filter(|e| filter.agent_id.is_none_or(|id| e.agent_id == Some(id)))
            .filter(|e| filter.since.is_none_or(|since| e.timestamp >= since))
            .cloned()
            .collect();

        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events.into_iter().skip(filter.offset).take(limit).collect())
    }

    async fn cleanup_old_events(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut inner = self.inner.write().await;
        let original = inner.events.len();
        inner.events.retain(|e| e.timestamp >= before);
        Ok(original - inner.events.len())
    }

    async fn insert_notification(&self, notification: Notification) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.notifications.push(notification);
        Ok(())
    }

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> StorageResult<Vec<Notification>> {
        let inner = self.inner.read().await;
        let limit = if limit == 0 { usize::MAX } else { limit };

        let mut notifications: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect();

        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        notifications.truncate(limit);
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;

        match inner
            .notifications
            .iter_mut()
            .find(|n| n.notification_id == notification_id)
        {
            Some(notification) => {
                notification.read = true;
                notification.read_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cleanup_old_notifications(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut inner = self.inner.write().await;
        let original = inner.notifications.len();
        inner.notifications.retain(|n| n.timestamp >= before);
        Ok(original - inner.notifications.len())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let inner = self.inner.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: std::collections::HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("agents".to_string(), inner.agents.len().to_string()),
                ("jobs".to_string(), inner.jobs.len().to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let inner = self.inner.read().await;
        Ok(format!(
            "In-Memory: {} agents, {} jobs, {} events, {} notifications",
            inner.agents.len(),
            inner.jobs.len(),
            inner.events.len(),
            inner.notifications.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
