//! Webhook notification delivery against a mock HTTP endpoint

use std::sync::Arc;
use std::time::Duration;

use custodia::{
    EventCategory, Priority,
    config::Webhook,
    events::{EventRecorder, NewEvent},
    notify::WebhookNotifier,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<wiremock::Request> {
    for _ in 0..50 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= expected {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn high_priority_event_is_delivered_to_webhook() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let storage = memory_storage();
    let notifier = Arc::new(WebhookNotifier::new(Webhook {
        url: mock_server.uri(),
    }));
    let events = EventRecorder::new(storage.clone(), notifier);

    events
        .record(NewEvent {
            category: EventCategory::System,
            event_type: "error".to_string(),
            description: "Storage pool degraded".to_string(),
            priority: Priority::Critical,
            agent_id: None,
            backup_job_id: None,
            related_id: None,
            details: None,
        })
        .await
        .unwrap();

    // dispatch runs in a detached task
    let received = wait_for_requests(&mock_server, 1).await;
    assert_eq!(received.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["category"], "system");
    assert_eq!(body["priority"], "critical");
    assert_eq!(body["message"], "Storage pool degraded");
}

#[tokio::test]
async fn low_priority_event_stays_local() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let storage = memory_storage();
    let notifier = Arc::new(WebhookNotifier::new(Webhook {
        url: mock_server.uri(),
    }));
    let events = EventRecorder::new(storage.clone(), notifier);

    events
        .record(NewEvent {
            category: EventCategory::Agent,
            event_type: "heartbeat".to_string(),
            description: "Heartbeat from web01".to_string(),
            priority: Priority::Low,
            agent_id: None,
            backup_job_id: None,
            related_id: None,
            details: None,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let received = mock_server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());

    // the event itself is still persisted
    let stored = storage
        .query_events(Default::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn failed_delivery_does_not_block_recording() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let storage = memory_storage();
    let notifier = Arc::new(WebhookNotifier::new(Webhook {
        url: mock_server.uri(),
    }));
    let events = EventRecorder::new(storage.clone(), notifier);

    let event = events
        .record(NewEvent {
            category: EventCategory::Backup,
            event_type: "failed".to_string(),
            description: "Backup failed on db01".to_string(),
            priority: Priority::High,
            agent_id: None,
            backup_job_id: None,
            related_id: None,
            details: None,
        })
        .await
        .unwrap();

    assert_eq!(event.priority, Priority::High);

    // the notification record exists even though delivery failed
    wait_for_requests(&mock_server, 1).await;
    let notifications = storage.list_notifications(false, 0).await.unwrap();
    assert_eq!(notifications.len(), 1);
}
