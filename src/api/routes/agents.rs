//! Agent lifecycle and backup reporting endpoints

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
    types::{
        AgentHealthResponse, AgentInfo, AgentListQuery, BackupListQuery, SetEnabledRequest,
        UpdateConfigRequest,
    },
};
use crate::health;
use crate::storage::{AgentFilter, JobQuery};
use crate::{NewBackupJob, RegisterRequest, RegisterResponse, ReportJobResponse};

/// POST /api/v1/agents/register
///
/// Register a new agent or refresh an existing one (keyed by hostname).
pub async fn register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let registration = state.registry.register(request).await?;

    Ok(Json(RegisterResponse {
        agent_id: registration.agent.agent_id,
        config_hash: registration.agent.config_hash,
    }))
}

/// GET /api/v1/agents
pub async fn list_agents(
    State(state): State<ApiState>,
    Query(query): Query<AgentListQuery>,
) -> ApiResult<Json<Value>> {
    let agents = state
        .registry
        .list(AgentFilter {
            enabled: query.enabled,
            offset: query.offset,
            limit: query.limit,
        })
        .await?;

    let now = Utc::now();
    let agents: Vec<AgentInfo> = agents
        .into_iter()
        .map(|agent| AgentInfo {
            online: health::is_online(&agent, now, &state.thresholds),
            agent,
        })
        .collect();

    let count = agents.len();
    Ok(Json(json!({
        "agents": agents,
        "count": count,
    })))
}

/// GET /api/v1/agents/:id
pub async fn get_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
) -> ApiResult<Json<AgentInfo>> {
    let Some(agent) = state.registry.get(agent_id).await? else {
        return Err(ApiError::NotFound(format!("unknown agent: {agent_id}")));
    };

    Ok(Json(AgentInfo {
        online: health::is_online(&agent, Utc::now(), &state.thresholds),
        agent,
    }))
}

/// POST /api/v1/agents/:id/heartbeat
///
/// 404 on unknown ids so agents know to re-register.
pub async fn heartbeat(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if state.registry.heartbeat(agent_id).await? {
        Ok(Json(json!({ "status": "ok" })))
    } else {
        Err(ApiError::NotFound(format!("unknown agent: {agent_id}")))
    }
}

/// POST /api/v1/agents/:id/backups
pub async fn report_backup(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
    Json(new_job): Json<NewBackupJob>,
) -> ApiResult<Json<ReportJobResponse>> {
    let job = state.ledger.record_job(agent_id, new_job).await?;
    Ok(Json(ReportJobResponse { job_id: job.job_id }))
}

/// GET /api/v1/agents/:id/backups
pub async fn list_backups(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
    Query(query): Query<BackupListQuery>,
) -> ApiResult<Json<Value>> {
    let since = query
        .days
        .map(|days| Utc::now() - Duration::days(days as i64));

    let jobs = state
        .ledger
        .query(JobQuery {
            agent_id: Some(agent_id),
            since,
            status: query.status,
            limit: query.limit,
            ..Default::default()
        })
        .await?;

    let count = jobs.len();
    Ok(Json(json!({
        "backups": jobs,
        "count": count,
    })))
}

/// GET /api/v1/agents/:id/config
pub async fn get_config(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let Some(config) = state.registry.get_config(agent_id).await? else {
        return Err(ApiError::NotFound(format!("unknown agent: {agent_id}")));
    };

    Ok(Json(json!({
        "agent_id": config.agent_id,
        "config": config.config,
        "config_hash": config.config_hash,
        "updated_at": config.updated_at,
    })))
}

/// PUT /api/v1/agents/:id/config
pub async fn update_config(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<UpdateConfigRequest>,
) -> ApiResult<Json<Value>> {
    let config_hash = state.registry.update_config(agent_id, request.config).await?;

    Ok(Json(json!({ "config_hash": config_hash })))
}

/// PUT /api/v1/agents/:id/enabled
pub async fn set_enabled(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<SetEnabledRequest>,
) -> ApiResult<Json<Value>> {
    state.registry.set_enabled(agent_id, request.enabled).await?;
    Ok(Json(json!({ "enabled": request.enabled })))
}

/// GET /api/v1/agents/:id/health
///
/// Evaluates health on demand from a fresh storage snapshot.
pub async fn get_health(
    State(state): State<ApiState>,
    Path(agent_id): Path<Uuid>,
) -> ApiResult<Json<AgentHealthResponse>> {
    let now = Utc::now();
    let since = now - Duration::days(state.thresholds.lookback_days as i64);

    let Some(snapshot) = state.storage.agent_snapshot(agent_id, since).await? else {
        return Err(ApiError::NotFound(format!("unknown agent: {agent_id}")));
    };

    let health = health::evaluate(
        &snapshot.agent,
        &snapshot.window_jobs,
        snapshot.totals,
        now,
        &state.thresholds,
    );

    Ok(Json(AgentHealthResponse {
        agent_id: snapshot.agent.agent_id,
        hostname: snapshot.agent.hostname,
        last_seen: snapshot.agent.last_seen,
        health,
    }))
}
