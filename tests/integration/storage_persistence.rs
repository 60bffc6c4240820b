//! SQLite persistence across backend restarts
//!
//! These tests run the full service stack against a database file, close
//! the backend, reopen the same file and verify nothing was lost.

use std::sync::Arc;

use custodia::{
    BackupStatus, EventCategory, Priority,
    events::NewEvent,
    storage::{EventFilter, JobQuery, SqliteBackend, StorageBackend},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn fleet_state_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hub.db");

    let agent_id = {
        let storage: Arc<dyn StorageBackend> =
            Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let registry = registry(&storage);
        let ledger = ledger(&storage);

        let agent_id = registry
            .register(register_request("persistent-db"))
            .await
            .unwrap()
            .agent
            .agent_id;
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Success, 1))
            .await
            .unwrap();
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Failed, 2))
            .await
            .unwrap();
        quiet_recorder(&storage)
            .record(NewEvent {
                category: EventCategory::Backup,
                event_type: "failed".to_string(),
                description: "Backup failed on persistent-db: repository locked".to_string(),
                priority: Priority::High,
                agent_id: Some(agent_id),
                backup_job_id: None,
                related_id: None,
                details: None,
            })
            .await
            .unwrap();

        storage.close().await.unwrap();
        agent_id
    };

    // reopen the same file with a fresh pool
    let storage: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::new(&db_path).await.unwrap());

    let agent = storage.get_agent(agent_id).await.unwrap().unwrap();
    assert_eq!(agent.hostname, "persistent-db");
    assert!(agent.enabled);

    let jobs = storage
        .query_jobs(JobQuery {
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);

    // recorded events made it to disk too
    let events = storage
        .query_events(EventFilter {
            category: Some(EventCategory::Backup),
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "failed");

    let config = storage.get_agent_config(agent_id).await.unwrap().unwrap();
    assert_eq!(config.config_hash, agent.config_hash);
}

#[tokio::test]
async fn registration_after_restart_keeps_agent_identity() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hub.db");

    let first_id = {
        let storage: Arc<dyn StorageBackend> =
            Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let registry = registry(&storage);
        let id = registry
            .register(register_request("web01"))
            .await
            .unwrap()
            .agent
            .agent_id;
        storage.close().await.unwrap();
        id
    };

    let storage: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    let registry = registry(&storage);

    let registration = registry
        .register(register_request("web01"))
        .await
        .unwrap();
    assert!(!registration.created);
    assert_eq!(registration.agent.agent_id, first_id);
}

#[tokio::test]
async fn snapshot_is_consistent_on_sqlite() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hub.db");
    let storage: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    let registry = registry(&storage);
    let ledger = ledger(&storage);

    let agent_id = registry
        .register(register_request("db01"))
        .await
        .unwrap()
        .agent
        .agent_id;

    // recent window: 3 jobs; old history: 2 more
    for _ in 0..3 {
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Success, 1))
            .await
            .unwrap();
    }
    for _ in 0..2 {
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Failed, 24 * 30))
            .await
            .unwrap();
    }

    let snapshot = storage
        .agent_snapshot(agent_id, chrono::Utc::now() - chrono::Duration::days(7))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(snapshot.window_jobs.len(), 3);
    assert_eq!(snapshot.totals.total, 5);
    assert_eq!(snapshot.totals.failed, 2);
}
