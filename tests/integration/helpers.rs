//! Helper functions for integration tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use custodia::{
    BackupStatus, NewBackupJob, RegisterRequest,
    config::Thresholds,
    events::EventRecorder,
    ledger::JobLedger,
    notify::NoopNotifier,
    registry::AgentRegistry,
    storage::{MemoryBackend, StorageBackend},
};

pub fn memory_storage() -> Arc<dyn StorageBackend> {
    Arc::new(MemoryBackend::new())
}

pub fn quiet_recorder(storage: &Arc<dyn StorageBackend>) -> EventRecorder {
    EventRecorder::new(storage.clone(), Arc::new(NoopNotifier))
}

pub fn registry(storage: &Arc<dyn StorageBackend>) -> AgentRegistry {
    AgentRegistry::new(storage.clone())
}

pub fn ledger(storage: &Arc<dyn StorageBackend>) -> JobLedger {
    JobLedger::new(storage.clone())
}

pub fn register_request(hostname: &str) -> RegisterRequest {
    RegisterRequest {
        hostname: hostname.to_string(),
        ip_address: "10.0.0.1".to_string(),
        os: "Debian 12".to_string(),
    }
}

/// A backup run that finished `hours_ago` hours ago and took 5 minutes.
pub fn finished_job(status: BackupStatus, hours_ago: i64) -> NewBackupJob {
    let end = Utc::now() - Duration::hours(hours_ago);
    NewBackupJob {
        status,
        tool: "restic".to_string(),
        source: "/var/lib/postgresql".to_string(),
        destination: "s3://backups/db".to_string(),
        size_bytes: 2 * 1024 * 1024 * 1024,
        start_time: end - Duration::minutes(5),
        end_time: Some(end),
        error_message: match status {
            BackupStatus::Failed => Some("repository locked".to_string()),
            _ => None,
        },
        logs: None,
    }
}

/// Thresholds with a tick interval long enough that only explicit
/// `tick_now` calls drive the evaluator during a test.
pub fn manual_tick_thresholds() -> Thresholds {
    Thresholds {
        tick_secs: 3600,
        ..Thresholds::default()
    }
}
