//! Evaluator actor passes over a seeded fleet
//!
//! These tests drive the evaluator through its handle and verify:
//! - Tick summaries count evaluated agents
//! - Liveness transitions produce agent events exactly once
//! - Tips activate for struggling agents and notify once

use chrono::{Duration, Utc};
use custodia::{
    Agent, BackupStatus, EventCategory, Priority,
    actors::EvaluatorHandle,
    config::Retention,
    storage::{AgentConfig, EventFilter},
    tips::TipScope,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::helpers::*;

/// Seed an agent directly so `last_seen` can lie in the past.
async fn seed_stale_agent(
    storage: &std::sync::Arc<dyn custodia::storage::StorageBackend>,
    hostname: &str,
    silent_for: Duration,
) -> Uuid {
    let last_seen = Utc::now() - silent_for;
    let agent = Agent {
        agent_id: Uuid::new_v4(),
        hostname: hostname.to_string(),
        ip_address: "10.0.0.9".to_string(),
        os: "Debian 12".to_string(),
        enabled: true,
        last_seen,
        config_hash: "seed".to_string(),
        registered_at: last_seen,
    };
    let id = agent.agent_id;
    let config = AgentConfig {
        agent_id: id,
        config: serde_json::json!({}),
        config_hash: "seed".to_string(),
        updated_at: last_seen,
    };
    storage.upsert_agent(agent, config).await.unwrap();
    id
}

#[tokio::test]
async fn tick_counts_enabled_agents_only() {
    let storage = memory_storage();
    let registry = registry(&storage);

    for hostname in ["a1", "a2", "a3"] {
        registry
            .register(register_request(hostname))
            .await
            .unwrap();
    }
    let disabled = registry
        .register(register_request("mothballed"))
        .await
        .unwrap()
        .agent
        .agent_id;
    registry.set_enabled(disabled, false).await.unwrap();

    let evaluator = EvaluatorHandle::spawn(
        storage.clone(),
        quiet_recorder(&storage),
        manual_tick_thresholds(),
        Retention::default(),
    );

    let summary = evaluator.tick_now().await.unwrap();
    assert_eq!(summary.agents_evaluated, 3);
    assert_eq!(summary.agents_skipped, 0);

    evaluator.shutdown().await.unwrap();
}

#[tokio::test]
async fn silent_agent_raises_one_offline_event_and_recovers() {
    let storage = memory_storage();
    let agent_id = seed_stale_agent(&storage, "silent-db", Duration::hours(2)).await;

    let evaluator = EvaluatorHandle::spawn(
        storage.clone(),
        quiet_recorder(&storage),
        manual_tick_thresholds(),
        Retention::default(),
    );

    evaluator.tick_now().await.unwrap();
    evaluator.tick_now().await.unwrap();

    let offline = storage
        .query_events(EventFilter {
            category: Some(EventCategory::Agent),
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    // one outage, one event, regardless of how many passes saw it
    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0].event_type, "offline");
    assert_eq!(offline[0].priority, Priority::High);

    // the agent comes back
    storage.touch_agent(agent_id, Utc::now()).await.unwrap();
    evaluator.tick_now().await.unwrap();

    let events = storage
        .query_events(EventFilter {
            category: Some(EventCategory::Agent),
            agent_id: Some(agent_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    // newest first
    assert_eq!(events[0].event_type, "online");

    evaluator.shutdown().await.unwrap();
}

#[tokio::test]
async fn failing_agent_activates_critical_tip_and_notifies_once() {
    let storage = memory_storage();
    let registry = registry(&storage);
    let ledger = ledger(&storage);

    let agent_id = registry
        .register(register_request("flaky"))
        .await
        .unwrap()
        .agent
        .agent_id;

    // 4 failures out of 6 runs: success rate 33%, failed > 3
    for _ in 0..2 {
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Success, 1))
            .await
            .unwrap();
    }
    for _ in 0..4 {
        ledger
            .record_job(agent_id, finished_job(BackupStatus::Failed, 1))
            .await
            .unwrap();
    }

    let evaluator = EvaluatorHandle::spawn(
        storage.clone(),
        quiet_recorder(&storage),
        manual_tick_thresholds(),
        Retention::default(),
    );

    let summary = evaluator.tick_now().await.unwrap();
    assert!(summary.active_tips >= 1);

    let tips = evaluator.tips().await.unwrap();
    let tip = tips
        .iter()
        .find(|t| t.rule_id == "backup_high_failure_rate")
        .expect("failure rate tip should be active");
    assert_eq!(tip.priority, Priority::Critical);
    assert_eq!(tip.scope, TipScope::Agent(agent_id));

    // the tip notified when it first matched, and stays quiet after
    let before = storage.list_notifications(false, 0).await.unwrap().len();
    evaluator.tick_now().await.unwrap();
    let after = storage.list_notifications(false, 0).await.unwrap().len();
    assert_eq!(before, after);

    evaluator.shutdown().await.unwrap();
}
