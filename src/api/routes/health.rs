//! Hub health check endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Reports hub liveness plus the storage backend's own health check and
/// record figures.
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let storage_health = state.storage.health_check().await?;
    let storage_stats = state.storage.get_stats().await?;

    Ok(Json(HealthResponse {
        status: if storage_health.healthy { "ok" } else { "degraded" }.to_string(),
        storage: storage_health.message,
        storage_stats,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
