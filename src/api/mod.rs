//! REST API server for the hub
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - Handlers call the registry, ledger and event recorder directly and
//!   reach the evaluator actor through its handle
//!
//! ## Endpoints
//!
//! - `POST /api/v1/agents/register` - Register or refresh an agent
//! - `GET  /api/v1/agents` - List agents
//! - `GET  /api/v1/agents/{id}` - Fetch one agent
//! - `POST /api/v1/agents/{id}/heartbeat` - Record a heartbeat
//! - `POST /api/v1/agents/{id}/backups` - Report a backup run
//! - `GET  /api/v1/agents/{id}/backups` - Backup history
//! - `GET  /api/v1/agents/{id}/config` - Fetch stored configuration
//! - `PUT  /api/v1/agents/{id}/config` - Replace configuration
//! - `PUT  /api/v1/agents/{id}/enabled` - Enable/disable an agent
//! - `GET  /api/v1/agents/{id}/health` - On-demand health evaluation
//! - `GET  /api/v1/events` - Query system events
//! - `GET  /api/v1/notifications` - List notifications
//! - `POST /api/v1/notifications/{id}/read` - Mark a notification read
//! - `GET  /api/v1/stats` - Fleet overview
//! - `GET  /api/v1/tips` - Active remediation tips
//! - `GET  /api/v1/health` - Hub health check

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;

use std::net::SocketAddr;

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
#[cfg(feature = "api")]
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:9200")
    pub bind_addr: SocketAddr,

    /// Enable CORS for external dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9200".parse().unwrap(),
            enable_cors: true,
        }
    }
}

/// Spawn the API server
///
/// Starts an Axum HTTP server in a background task and returns the bound
/// local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut app = Router::new()
        .route("/api/v1/agents/register", post(routes::agents::register))
        .route("/api/v1/agents", get(routes::agents::list_agents))
        .route("/api/v1/agents/:id", get(routes::agents::get_agent))
        .route(
            "/api/v1/agents/:id/heartbeat",
            post(routes::agents::heartbeat),
        )
        .route(
            "/api/v1/agents/:id/backups",
            post(routes::agents::report_backup).get(routes::agents::list_backups),
        )
        .route(
            "/api/v1/agents/:id/config",
            get(routes::agents::get_config).put(routes::agents::update_config),
        )
        .route(
            "/api/v1/agents/:id/enabled",
            axum::routing::put(routes::agents::set_enabled),
        )
        .route("/api/v1/agents/:id/health", get(routes::agents::get_health))
        .route("/api/v1/events", get(routes::events::list_events))
        .route(
            "/api/v1/notifications",
            get(routes::events::list_notifications),
        )
        .route(
            "/api/v1/notifications/:id/read",
            post(routes::events::mark_notification_read),
        )
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/tips", get(routes::stats::get_tips))
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
