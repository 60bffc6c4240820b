use std::sync::Arc;

use clap::Parser;
use custodia::{
    config::{Config, StorageConfig, read_config_file},
    events::{EventRecorder, NewEvent},
    ledger::JobLedger,
    notify::{Notifier, NoopNotifier, WebhookNotifier},
    registry::AgentRegistry,
    storage::{MemoryBackend, StorageBackend},
    EventCategory, Priority,
};
use custodia::actors::EvaluatorHandle;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("custodia", LevelFilter::TRACE),
        ("custodia_hub", LevelFilter::TRACE),
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

async fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config.storage.clone().unwrap_or_default() {
        StorageConfig::None => {
            info!("using in-memory storage, state is lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = custodia::storage::SqliteBackend::new(&path).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("SQLite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };

    let storage = build_storage(&config).await?;

    let notifier: Arc<dyn Notifier> = match &config.webhook {
        Some(webhook) => Arc::new(WebhookNotifier::new(webhook.clone())),
        None => Arc::new(NoopNotifier),
    };

    let events = EventRecorder::new(storage.clone(), notifier);
    let registry = AgentRegistry::new(storage.clone());
    let ledger = JobLedger::new(storage.clone());

    let evaluator = EvaluatorHandle::spawn(
        storage.clone(),
        events.clone(),
        config.thresholds.clone(),
        config.retention,
    );

    if let Err(e) = events
        .record(NewEvent {
            category: EventCategory::System,
            event_type: "startup".to_string(),
            description: "Hub started".to_string(),
            priority: Priority::Low,
            agent_id: None,
            backup_job_id: None,
            related_id: None,
            details: None,
        })
        .await
    {
        error!("failed to record startup event: {e}");
    }

    #[cfg(feature = "api")]
    {
        let api_config = custodia::api::ApiConfig {
            bind_addr: config
                .listen
                .unwrap_or_else(|| "127.0.0.1:9200".parse().unwrap()),
            enable_cors: true,
        };
        let state = custodia::api::ApiState::new(
            registry.clone(),
            ledger.clone(),
            events.clone(),
            evaluator.clone(),
            storage.clone(),
            config.thresholds.clone(),
        );
        custodia::api::spawn_api_server(api_config, state).await?;
    }

    #[cfg(not(feature = "api"))]
    {
        // keep the handles alive; without the API the hub only evaluates
        let _ = (&registry, &ledger);
    }

    info!("hub running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Err(e) = events
        .record(NewEvent {
            category: EventCategory::System,
            event_type: "shutdown".to_string(),
            description: "Hub shutting down".to_string(),
            priority: Priority::Low,
            agent_id: None,
            backup_job_id: None,
            related_id: None,
            details: None,
        })
        .await
    {
        error!("failed to record shutdown event: {e}");
    }

    if let Err(e) = evaluator.shutdown().await {
        error!("failed to stop evaluator: {e}");
    }
    storage.close().await?;

    Ok(())
}
