//! End-to-end flows through the registry and job ledger
//!
//! These tests wire the services against in-memory storage and verify:
//! - Registration is idempotent per hostname
//! - Heartbeats advance liveness
//! - Reported jobs show up in queries and health evaluation
//! - Failed outcomes are alerted by the next evaluator pass
//! - Config updates change the content hash

use chrono::{Duration, Utc};
use custodia::{
    BackupStatus, EventCategory, Priority,
    actors::EvaluatorHandle,
    config::Retention,
    health,
    storage::{EventFilter, JobQuery},
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn register_heartbeat_report_lifecycle() {
    let storage = memory_storage();
    let registry = registry(&storage);
    let ledger = ledger(&storage);

    let registration = registry
        .register(register_request("db01.prod"))
        .await
        .unwrap();
    assert!(registration.created);
    let agent_id = registration.agent.agent_id;

    // registering the same hostname again keeps the identity
    let again = registry
        .register(register_request("db01.prod"))
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.agent.agent_id, agent_id);

    assert!(registry.heartbeat(agent_id).await.unwrap());

    // 7 successes and 3 failures, the reference scenario
    for _ in 0..7 {
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Success, 1))
            .await
            .unwrap();
    }
    for _ in 0..3 {
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Failed, 1))
            .await
            .unwrap();
    }

    let jobs = ledger
        .query(JobQuery {
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(jobs.len(), 10);

    let snapshot = storage
        .agent_snapshot(agent_id, Utc::now() - Duration::days(7))
        .await
        .unwrap()
        .unwrap();
    let health = health::evaluate(
        &snapshot.agent,
        &snapshot.window_jobs,
        snapshot.totals,
        Utc::now(),
        &manual_tick_thresholds(),
    );

    assert!(health.online);
    assert_eq!(health.performance.success_rate, 70.0);
    assert_eq!(health.score, 85.0);
}

#[tokio::test]
async fn failed_backup_alerts_on_next_evaluator_pass() {
    let storage = memory_storage();
    let registry = registry(&storage);
    let ledger = ledger(&storage);
    let evaluator = EvaluatorHandle::spawn(
        storage.clone(),
        quiet_recorder(&storage),
        manual_tick_thresholds(),
        Retention::default(),
    );

    let agent_id = registry
        .register(register_request("db02"))
        .await
        .unwrap()
        .agent
        .agent_id;

    ledger
        .record_job(agent_id, finished_job(BackupStatus::Failed, 0))
        .await
        .unwrap();

    evaluator.tick_now().await.unwrap();

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
    assert_eq!(events[0].priority, Priority::High);
    assert!(events[0].description.contains("repository locked"));

    // high priority events raise a notification
    let notifications = storage.list_notifications(true, 0).await.unwrap();
    assert!(notifications.iter().any(|n| n.message == events[0].description));

    evaluator.shutdown().await.unwrap();
}

#[tokio::test]
async fn config_update_changes_hash_and_survives_roundtrip() {
    let storage = memory_storage();
    let registry = registry(&storage);

    let agent_id = registry
        .register(register_request("web01"))
        .await
        .unwrap()
        .agent
        .agent_id;

    let initial = registry.get_config(agent_id).await.unwrap().unwrap();

    let new_config = json!({
        "heartbeat_interval": 30,
        "backup_jobs": [{"source": "/etc", "destination": "s3://backups/etc"}],
        "repositories": [],
        "logging": {"level": "DEBUG", "file": "/var/log/agent.log"}
    });
    let new_hash = registry
        .update_config(agent_id, new_config.clone())
        .await
        .unwrap();

    assert_ne!(new_hash, initial.config_hash);

    let stored = registry.get_config(agent_id).await.unwrap().unwrap();
    assert_eq!(stored.config, new_config);
    assert_eq!(stored.config_hash, new_hash);
}

#[tokio::test]
async fn disabled_agent_keeps_history_but_drops_from_enabled_list() {
    let storage = memory_storage();
    let registry = registry(&storage);
    let ledger = ledger(&storage);

    let agent_id = registry
        .register(register_request("old-box"))
        .await
        .unwrap()
        .agent
        .agent_id;
    ledger
        .record_job(agent_id, finished_job(BackupStatus::Success, 2))
        .await
        .unwrap();

    registry.set_enabled(agent_id, false).await.unwrap();

    let enabled = registry
        .list(custodia::storage::AgentFilter {
            enabled: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(enabled.is_empty());

    // the job history is untouched
    let jobs = ledger
        .query(JobQuery {
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
}
