//! Fleet overview and tips endpoints

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, state::ApiState};
use crate::stats::{self, SystemOverview};

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<SystemOverview>> {
    let overview = stats::system_overview(&state.storage, &state.thresholds).await?;
    Ok(Json(overview))
}

/// GET /api/v1/tips
///
/// Active tips from the evaluator's last pass, highest priority first.
pub async fn get_tips(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let tips = state.evaluator.tips().await?;

    let count = tips.len();
    Ok(Json(json!({
        "tips": tips,
        "count": count,
    })))
}
