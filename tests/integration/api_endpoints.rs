//! Integration tests for the REST API
//!
//! These tests spawn a real server on a random port and drive it with an
//! HTTP client, covering registration, reporting, health evaluation and
//! the notification flow.

use std::net::SocketAddr;
use std::sync::Arc;

use custodia::{
    RegisterResponse, ReportJobResponse,
    actors::EvaluatorHandle,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::Retention,
    storage::StorageBackend,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::helpers::*;

async fn spawn_test_api() -> (SocketAddr, Arc<dyn StorageBackend>, EvaluatorHandle) {
    let storage = memory_storage();
    let events = quiet_recorder(&storage);
    let evaluator = EvaluatorHandle::spawn(
        storage.clone(),
        events.clone(),
        manual_tick_thresholds(),
        Retention::default(),
    );

    let state = ApiState::new(
        registry(&storage),
        ledger(&storage),
        events,
        evaluator.clone(),
        storage.clone(),
        manual_tick_thresholds(),
    );

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: false,
    };

    let addr = spawn_api_server(config, state).await.unwrap();
    (addr, storage, evaluator)
}

async fn register_agent(client: &reqwest::Client, addr: SocketAddr, hostname: &str) -> Uuid {
    let response = client
        .post(format!("http://{addr}/api/v1/agents/register"))
        .json(&json!({"hostname": hostname, "ip_address": "10.0.0.1", "os": "Debian 12"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json::<RegisterResponse>().await.unwrap().agent_id
}

#[tokio::test]
async fn register_and_list_agents() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();

    register_agent(&client, addr, "web01").await;
    register_agent(&client, addr, "db01").await;

    let body: Value = client
        .get(format!("http://{addr}/api/v1/agents"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["count"], 2);
    let agents = body["agents"].as_array().unwrap();
    assert!(agents.iter().all(|a| a["online"] == true));
}

#[tokio::test]
async fn invalid_hostname_is_rejected() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/agents/register"))
        .json(&json!({"hostname": "  "}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("hostname"));
}

#[tokio::test]
async fn heartbeat_for_unknown_agent_is_404() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!(
            "http://{addr}/api/v1/agents/{}/heartbeat",
            Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_backup_and_query_history() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();
    let agent_id = register_agent(&client, addr, "db01").await;

    let response = client
        .post(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
        .json(&finished_job(custodia::BackupStatus::Success, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json::<ReportJobResponse>().await.unwrap();

    let body: Value = client
        .get(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["count"], 1);
    assert_eq!(body["backups"][0]["status"], "success");
    assert_eq!(body["backups"][0]["tool"], "restic");
}

#[tokio::test]
async fn health_endpoint_reports_reference_scenario() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();
    let agent_id = register_agent(&client, addr, "db01").await;

    for _ in 0..7 {
        client
            .post(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
            .json(&finished_job(custodia::BackupStatus::Success, 1))
            .send()
            .await
            .unwrap();
    }
    for _ in 0..3 {
        client
            .post(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
            .json(&finished_job(custodia::BackupStatus::Failed, 1))
            .send()
            .await
            .unwrap();
    }

    let body: Value = client
        .get(format!("http://{addr}/api/v1/agents/{agent_id}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["hostname"], "db01");
    assert_eq!(body["online"], true);
    assert_eq!(body["performance"]["success_rate"], 70.0);
    assert_eq!(body["score"], 85.0);
}

#[tokio::test]
async fn config_roundtrip_over_http() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();
    let agent_id = register_agent(&client, addr, "web01").await;

    let initial: Value = client
        .get(format!("http://{addr}/api/v1/agents/{agent_id}/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let initial_hash = initial["config_hash"].as_str().unwrap().to_string();

    let updated: Value = client
        .put(format!("http://{addr}/api/v1/agents/{agent_id}/config"))
        .json(&json!({"config": {"heartbeat_interval": 30, "backup_jobs": []}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_ne!(updated["config_hash"].as_str().unwrap(), initial_hash);

    let stored: Value = client
        .get(format!("http://{addr}/api/v1/agents/{agent_id}/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["config"]["heartbeat_interval"], 30);
    assert_eq!(stored["config_hash"], updated["config_hash"]);
}

#[tokio::test]
async fn failed_backup_surfaces_in_events_and_notifications() {
    let (addr, _storage, evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();
    let agent_id = register_agent(&client, addr, "db02").await;

    client
        .post(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
        .json(&finished_job(custodia::BackupStatus::Failed, 0))
        .send()
        .await
        .unwrap();

    // alerting happens on the evaluator pass, not on recording
    evaluator.tick_now().await.unwrap();

    let events: Value = client
        .get(format!("http://{addr}/api/v1/events?category=backup"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events["count"], 1);
    assert_eq!(events["events"][0]["event_type"], "failed");

    let notifications: Value = client
        .get(format!("http://{addr}/api/v1/notifications?unread_only=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notifications["count"], 1);

    let notification_id = notifications["notifications"][0]["notification_id"]
        .as_str()
        .unwrap()
        .to_string();
    let response = client
        .post(format!(
            "http://{addr}/api/v1/notifications/{notification_id}/read"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let unread: Value = client
        .get(format!("http://{addr}/api/v1/notifications?unread_only=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 0);
}

#[tokio::test]
async fn stats_and_hub_health_endpoints() {
    let (addr, _storage, _evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();
    let agent_id = register_agent(&client, addr, "db01").await;

    client
        .post(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
        .json(&finished_job(custodia::BackupStatus::Success, 1))
        .send()
        .await
        .unwrap();

    let stats: Value = client
        .get(format!("http://{addr}/api/v1/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats["total_agents"], 1);
    assert_eq!(stats["online_agents"], 1);
    assert_eq!(stats["total_backups"], 1);
    assert_eq!(stats["success_rate"], 100.0);

    let health: Value = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    // backend record figures come along for operators
    let storage_stats = health["storage_stats"].as_str().unwrap();
    assert!(storage_stats.contains("1 agents"));
    assert!(storage_stats.contains("1 jobs"));
}

#[tokio::test]
async fn tips_endpoint_returns_active_tips() {
    let (addr, _storage, evaluator) = spawn_test_api().await;
    let client = reqwest::Client::new();
    let agent_id = register_agent(&client, addr, "flaky").await;

    for _ in 0..4 {
        client
            .post(format!("http://{addr}/api/v1/agents/{agent_id}/backups"))
            .json(&finished_job(custodia::BackupStatus::Failed, 1))
            .send()
            .await
            .unwrap();
    }

    // run an evaluation pass so the tip set reflects the reports
    evaluator.tick_now().await.unwrap();

    let body: Value = client
        .get(format!("http://{addr}/api/v1/tips"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body["count"].as_u64().unwrap() >= 1);
    let tips = body["tips"].as_array().unwrap();
    assert!(
        tips.iter()
            .any(|t| t["rule_id"] == "backup_high_failure_rate")
    );
}
