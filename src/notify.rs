//! Outbound notification delivery
//!
//! Delivery is best-effort and fire-and-forget: a failed webhook is logged
//! and never propagated, the notification record itself is already
//! persisted by the event engine before dispatch is attempted.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::config::Webhook;
use crate::Notification;

/// Sink for high-priority notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification);
}

/// POSTs notifications as JSON to a configured webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
}

impl WebhookNotifier {
    pub fn new(webhook: Webhook) -> Self {
        Self {
            client: Client::new(),
            webhook,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(title = %notification.title))]
    async fn notify(&self, notification: &Notification) {
        let payload = json!({
            "title": notification.title,
            "message": notification.message,
            "category": notification.category,
            "priority": notification.priority,
            "timestamp": Utc::now().to_rfc3339(),
        });

        match self.client.post(&self.webhook.url).json(&payload).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    info!("Successfully sent webhook notification");
                } else {
                    error!(
                        "Webhook notification failed with status: {}",
                        response.status()
                    );
                }
            }
            Err(e) => {
                error!("Failed to send webhook notification: {}", e);
            }
        }
    }
}

/// Discards notifications. Used when no webhook is configured and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) {}
}
