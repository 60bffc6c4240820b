use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use custodia::{BackupStatus, NewBackupJob, RegisterRequest, RegisterResponse, ReportJobResponse};
use reqwest::StatusCode;
use sysinfo::System;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const MAX_BACKOFF_SECS: u64 = 300;

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Base URL of the hub
    #[arg(short, long, default_value = "http://127.0.0.1:9200")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Register with the hub and send heartbeats until interrupted
    Run {
        /// Seconds between heartbeats
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
    /// Report a single backup run and exit
    Report {
        /// Agent id issued at registration
        #[arg(long)]
        agent_id: Uuid,

        /// Outcome of the run: running, success, failed or warning
        #[arg(long)]
        status: BackupStatus,

        /// Backup tool that produced the run
        #[arg(long)]
        tool: String,

        #[arg(long)]
        source: String,

        #[arg(long)]
        destination: String,

        #[arg(long, default_value_t = 0)]
        size_bytes: u64,

        /// How long the run took; omitted for still-running jobs
        #[arg(long)]
        duration_secs: Option<u64>,

        #[arg(long)]
        error_message: Option<String>,
    },
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("custodia", LevelFilter::TRACE),
        ("custodia_agent", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn register(client: &reqwest::Client, server: &str) -> anyhow::Result<RegisterResponse> {
    let hostname = System::host_name()
        .ok_or_else(|| anyhow::anyhow!("could not determine the local hostname"))?;
    let os = match (System::name(), System::os_version()) {
        (Some(name), Some(version)) => format!("{name} {version}"),
        (Some(name), None) => name,
        _ => "unknown".to_string(),
    };

    let request = RegisterRequest {
        hostname,
        ip_address: String::new(),
        os,
    };

    let response = client
        .post(format!("{server}/api/v1/agents/register"))
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json::<RegisterResponse>()
        .await?;

    info!(
        "registered {} as agent {}",
        request.hostname, response.agent_id
    );
    Ok(response)
}

/// `Ok(true)` when the hub accepted the heartbeat, `Ok(false)` when it no
/// longer knows this agent and a re-registration is needed.
async fn heartbeat(client: &reqwest::Client, server: &str, agent_id: Uuid) -> anyhow::Result<bool> {
    let response = client
        .post(format!("{server}/api/v1/agents/{agent_id}/heartbeat"))
        .send()
        .await?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(false);
    }

    response.error_for_status()?;
    Ok(true)
}

async fn run(client: reqwest::Client, server: String, interval: u64) -> anyhow::Result<()> {
    let mut registration = register(&client, &server).await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut backoff = 1;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                match heartbeat(&client, &server, registration.agent_id).await {
                    Ok(true) => {
                        trace!("heartbeat acknowledged");
                        backoff = 1;
                    }
                    Ok(false) => {
                        warn!("hub no longer knows agent {}, re-registering", registration.agent_id);
                        match register(&client, &server).await {
                            Ok(fresh) => registration = fresh,
                            Err(e) => error!("re-registration failed: {e}"),
                        }
                    }
                    Err(e) => {
                        error!("heartbeat failed: {e}, retrying in {backoff}s");
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn report(
    client: reqwest::Client,
    server: String,
    agent_id: Uuid,
    status: BackupStatus,
    tool: String,
    source: String,
    destination: String,
    size_bytes: u64,
    duration_secs: Option<u64>,
    error_message: Option<String>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let (start_time, end_time) = match duration_secs {
        Some(secs) => (now - chrono::Duration::seconds(secs as i64), Some(now)),
        None => (now, None),
    };

    let job = NewBackupJob {
        status,
        tool,
        source,
        destination,
        size_bytes,
        start_time,
        end_time,
        error_message,
        logs: None,
    };

    let response = client
        .post(format!("{server}/api/v1/agents/{agent_id}/backups"))
        .json(&job)
        .send()
        .await?
        .error_for_status()?
        .json::<ReportJobResponse>()
        .await?;

    info!("backup run recorded as job {}", response.job_id);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let client = reqwest::Client::new();
    let server = args.server.trim_end_matches('/').to_string();

    match args.command {
        Command::Run { interval } => run(client, server, interval).await,
        Command::Report {
            agent_id,
            status,
            tool,
            source,
            destination,
            size_bytes,
            duration_secs,
            error_message,
        } => {
            report(
                client,
                server,
                agent_id,
                status,
                tool,
                source,
                destination,
                size_bytes,
                duration_secs,
                error_message,
            )
            .await
        }
    }
}
