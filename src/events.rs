//! Event and alert engine
//!
//! Every recorded event carries a `(category, event_type)` pair checked
//! against a fixed vocabulary. Unknown pairs are rejected outright rather
//! than coerced to the nearest valid type, so producers fail loudly when
//! they drift from the vocabulary.
//!
//! Events at high or critical priority additionally produce a persisted
//! notification, dispatched to the configured notifier on a detached task
//! so a slow or dead webhook never blocks the event path.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::Retention;
use crate::notify::Notifier;
use crate::storage::{EventFilter, StorageBackend, StorageError};
use crate::{EventCategory, Notification, Priority, SystemEvent};

/// Valid event types per category.
pub fn allowed_event_types(category: EventCategory) -> &'static [&'static str] {
    match category {
        EventCategory::Agent => &["register", "heartbeat", "config_update", "offline", "online"],
        EventCategory::Backup => &["start", "success", "failed", "warning"],
        EventCategory::System => &["startup", "shutdown", "error", "maintenance"],
        EventCategory::Security => &["login", "logout", "unauthorized", "config_change"],
    }
}

#[derive(Debug)]
pub enum EventError {
    /// The `(category, event_type)` pair is not in the vocabulary
    InvalidEventType {
        category: EventCategory,
        event_type: String,
    },
    Storage(StorageError),
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::InvalidEventType {
                category,
                event_type,
            } => write!(
                f,
                "invalid event type for category {}: {}",
                category, event_type
            ),
            EventError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EventError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EventError {
    fn from(e: StorageError) -> Self {
        EventError::Storage(e)
    }
}

/// Fields producers supply when recording an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub category: EventCategory,
    pub event_type: String,
    pub description: String,
    pub priority: Priority,
    pub agent_id: Option<Uuid>,
    pub backup_job_id: Option<Uuid>,
    pub related_id: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// Records events and fans high-priority ones out as notifications.
#[derive(Clone)]
pub struct EventRecorder {
    storage: Arc<dyn StorageBackend>,
    notifier: Arc<dyn Notifier>,
}

impl EventRecorder {
    pub fn new(storage: Arc<dyn StorageBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self { storage, notifier }
    }

    /// Validate and persist an event; high and critical priority events
    /// also produce a notification.
    #[instrument(skip(self, new_event), fields(category = %new_event.category, event_type = %new_event.event_type))]
    pub async fn record(&self, new_event: NewEvent) -> Result<SystemEvent, EventError> {
        if !allowed_event_types(new_event.category).contains(&new_event.event_type.as_str()) {
            return Err(EventError::InvalidEventType {
                category: new_event.category,
                event_type: new_event.event_type,
            });
        }

        let event = SystemEvent {
            event_id: Uuid::new_v4(),
            category: new_event.category,
            event_type: new_event.event_type,
            description: new_event.description,
            priority: new_event.priority,
            agent_id: new_event.agent_id,
            backup_job_id: new_event.backup_job_id,
            related_id: new_event.related_id,
            details: new_event.details,
            timestamp: Utc::now(),
        };

        self.storage.insert_event(event.clone()).await?;
        debug!("event recorded: {}/{}", event.category, event.event_type);

        if event.priority >= Priority::High {
            self.raise_notification(&event).await?;
        }

        Ok(event)
    }

    async fn raise_notification(&self, event: &SystemEvent) -> Result<(), EventError> {
        self.notify(
            format!(
                "{} event: {}",
                event.priority.to_string().to_uppercase(),
                event.event_type
            ),
            event.description.clone(),
            event.category,
            event.priority,
            event
                .agent_id
                .map(|id| id.to_string())
                .or_else(|| event.related_id.clone()),
        )
        .await
    }

    /// Persist a notification and dispatch it out-of-band.
    pub async fn notify(
        &self,
        title: String,
        message: String,
        category: EventCategory,
        priority: Priority,
        related_id: Option<String>,
    ) -> Result<(), EventError> {
        let notification = Notification {
            notification_id: Uuid::new_v4(),
            title,
            message,
            category,
            priority,
            related_id,
            read: false,
            read_at: None,
            timestamp: Utc::now(),
        };

        self.storage.insert_notification(notification.clone()).await?;
        info!("notification raised: {}", notification.title);

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            notifier.notify(&notification).await;
        });

        Ok(())
    }

    pub async fn query(&self, filter: EventFilter) -> Result<Vec<SystemEvent>, EventError> {
        Ok(self.storage.query_events(filter).await?)
    }

    pub async fn list_notifications(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, EventError> {
        Ok(self.storage.list_notifications(unread_only, limit).await?)
    }

    /// Returns `false` when the notification does not exist.
    pub async fn mark_notification_read(
        &self,
        notification_id: Uuid,
    ) -> Result<bool, EventError> {
        Ok(self
            .storage
            .mark_notification_read(notification_id, Utc::now())
            .await?)
    }

    /// Purge events and notifications past their retention age.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, retention: &Retention) -> Result<(usize, usize), EventError> {
        let now = Utc::now();
        let events_deleted = self
            .storage
            .cleanup_old_events(now - Duration::days(retention.event_days as i64))
            .await?;
        let notifications_deleted = self
            .storage
            .cleanup_old_notifications(now - Duration::days(retention.notification_days as i64))
            .await?;

        if events_deleted > 0 || notifications_deleted > 0 {
            info!(
                "retention cleanup removed {} events, {} notifications",
                events_deleted, notifications_deleted
            );
        }
        Ok((events_deleted, notifications_deleted))
    }
}
