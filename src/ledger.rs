//! Backup job ledger
//!
//! Append-only log of backup runs reported by agents. Records are
//! validated once on entry (known agent, required fields, end after
//! start) and are immutable afterwards; agents that need to correct a
//! report submit a new record.
//!
//! Recording is persistence only. Failure alerting is the evaluator's
//! job: its next pass picks up newly recorded outcomes and routes them
//! through the event engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::storage::{JobQuery, StorageBackend, StorageError};
use crate::{BackupJob, BackupStatus, JobStats, NewBackupJob};

#[derive(Debug)]
pub enum LedgerError {
    Validation(String),
    UnknownAgent(Uuid),
    Storage(StorageError),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "validation failed: {}", msg),
            LedgerError::UnknownAgent(id) => write!(f, "unknown agent: {}", id),
            LedgerError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        LedgerError::Storage(e)
    }
}

/// Append-only ledger of backup job outcomes
#[derive(Clone)]
pub struct JobLedger {
    storage: Arc<dyn StorageBackend>,
}

impl JobLedger {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    fn validate(new_job: &NewBackupJob) -> Result<(), LedgerError> {
        if new_job.tool.trim().is_empty() {
            return Err(LedgerError::Validation("tool is required".to_string()));
        }
        if new_job.source.trim().is_empty() {
            return Err(LedgerError::Validation("source is required".to_string()));
        }
        if new_job.destination.trim().is_empty() {
            return Err(LedgerError::Validation(
                "destination is required".to_string(),
            ));
        }
        if let Some(end) = new_job.end_time
            && end < new_job.start_time
        {
            return Err(LedgerError::Validation(
                "end_time precedes start_time".to_string(),
            ));
        }
        Ok(())
    }

    /// Record a backup run for a registered agent.
    #[instrument(skip(self, new_job), fields(agent_id = %agent_id, status = %new_job.status))]
    pub async fn record_job(
        &self,
        agent_id: Uuid,
        new_job: NewBackupJob,
    ) -> Result<BackupJob, LedgerError> {
        Self::validate(&new_job)?;

        let Some(agent) = self.storage.get_agent(agent_id).await? else {
            return Err(LedgerError::UnknownAgent(agent_id));
        };

        let job = BackupJob {
            job_id: Uuid::new_v4(),
            agent_id,
            status: new_job.status,
            tool: new_job.tool,
            source: new_job.source,
            destination: new_job.destination,
            size_bytes: new_job.size_bytes,
            start_time: new_job.start_time,
            end_time: new_job.end_time,
            error_message: new_job.error_message,
            logs: new_job.logs,
            created_at: Utc::now(),
        };

        self.storage.insert_job(job.clone()).await?;
        info!(
            "backup job recorded: {} on {} ({})",
            job.job_id, agent.hostname, job.status
        );

        Ok(job)
    }

    pub async fn query(&self, query: JobQuery) -> Result<Vec<BackupJob>, LedgerError> {
        Ok(self.storage.query_jobs(query).await?)
    }

    pub async fn count_by_status(
        &self,
        status: BackupStatus,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, LedgerError> {
        Ok(self.storage.count_jobs(Some(status), None, since).await?)
    }

    pub async fn sum_size_bytes(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, LedgerError> {
        Ok(self.storage.sum_job_sizes(None, since).await?)
    }

    /// All-time counts for one agent.
    pub async fn stats(&self, agent_id: Uuid) -> Result<JobStats, LedgerError> {
        let total = self.storage.count_jobs(None, Some(agent_id), None).await?;
        let success = self
            .storage
            .count_jobs(Some(BackupStatus::Success), Some(agent_id), None)
            .await?;
        let failed = self
            .storage
            .count_jobs(Some(BackupStatus::Failed), Some(agent_id), None)
            .await?;

        Ok(JobStats {
            total,
            success,
            failed,
        })
    }
}
