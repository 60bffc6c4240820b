//! Event and notification endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{EventListQuery, NotificationListQuery},
};
use crate::storage::EventFilter;

/// Default event page size
const DEFAULT_EVENT_LIMIT: usize = 50;

/// Default event lookback in days
const DEFAULT_EVENT_DAYS: u64 = 7;

/// GET /api/v1/events
pub async fn list_events(
    State(state): State<ApiState>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<Json<Value>> {
    let days = query.days.unwrap_or(DEFAULT_EVENT_DAYS);

    let events = state
        .events
        .query(EventFilter {
            category: query.category,
            priority: query.priority,
            agent_id: query.agent_id,
            since: Some(Utc::now() - Duration::days(days as i64)),
            offset: query.skip,
            limit: query.limit.unwrap_or(DEFAULT_EVENT_LIMIT),
        })
        .await?;

    let count = events.len();
    Ok(Json(json!({
        "events": events,
        "count": count,
    })))
}

/// GET /api/v1/notifications
pub async fn list_notifications(
    State(state): State<ApiState>,
    Query(query): Query<NotificationListQuery>,
) -> ApiResult<Json<Value>> {
    let notifications = state
        .events
        .list_notifications(query.unread_only, query.limit.unwrap_or(DEFAULT_EVENT_LIMIT))
        .await?;

    let count = notifications.len();
    Ok(Json(json!({
        "notifications": notifications,
        "count": count,
    })))
}

/// POST /api/v1/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<ApiState>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if state.events.mark_notification_read(notification_id).await? {
        Ok(Json(json!({ "read": true })))
    } else {
        Err(ApiError::NotFound(format!(
            "unknown notification: {notification_id}"
        )))
    }
}
