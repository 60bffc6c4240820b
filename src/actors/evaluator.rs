//! EvaluatorActor - periodic liveness, health and tip evaluation
//!
//! Runs an evaluation pass at a fixed interval (and on demand via
//! `TickNow`). Each pass:
//!
//! 1. Fetches a consistent snapshot per enabled agent, each fetch bounded
//!    by a timeout so one slow backend read cannot stall the whole pass
//! 2. Computes health and detects liveness transitions, recording
//!    `agent/offline` and `agent/online` events on state changes
//! 3. Raises backup events for failed or warning outcomes recorded since
//!    the agent's last successful scan, each outcome at most once
//! 4. Matches tip rules against per-agent and system-wide metrics
//! 5. Runs retention cleanup once per day
//!
//! ## Transition tracking
//!
//! Liveness events fire on transitions, not states: an agent that stays
//! offline across many passes produces exactly one offline event, and one
//! online event when it recovers. An agent first observed offline counts
//! as a transition so dead agents are alerted at hub startup.
//!
//! Tips follow the same idea keyed by `(rule_id, subject)`: a tip raises a
//! notification when it first matches, stays silent while the condition
//! persists, and may fire again after the condition clears and recurs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Retention, Thresholds};
use crate::events::{EventRecorder, NewEvent};
use crate::health::{self, HealthSnapshot};
use crate::stats;
use crate::storage::{AgentFilter, AgentSnapshot, JobQuery, StorageBackend};
use crate::util;
use crate::tips::{
    self, MetricValue, Metrics, Rule, RuleCategory, Tip, TipScope,
};
use crate::{Agent, BackupStatus, EventCategory, Priority};

use super::messages::{EvaluatorCommand, TickSummary};

/// Retention cleanup runs at most once per this many hours
const CLEANUP_INTERVAL_HOURS: i64 = 24;

/// Actor that periodically evaluates the fleet
pub struct EvaluatorActor {
    storage: Arc<dyn StorageBackend>,
    events: EventRecorder,
    thresholds: Thresholds,
    retention: Retention,
    rules: Vec<Rule>,

    command_rx: mpsc::Receiver<EvaluatorCommand>,

    /// Last observed liveness per agent
    online: HashMap<Uuid, bool>,

    /// Tips currently matching, keyed for deduplication
    active_tips: HashMap<(String, TipScope), Tip>,

    /// Per-agent watermark: jobs recorded before this instant have been
    /// through outcome alerting. Advanced only after a successful scan, so
    /// an agent skipped on one pass catches up on the next.
    job_scans: HashMap<Uuid, DateTime<Utc>>,

    /// Watermark origin for agents not yet scanned
    started: DateTime<Utc>,

    last_cleanup: Option<DateTime<Utc>>,
}

impl EvaluatorActor {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        events: EventRecorder,
        thresholds: Thresholds,
        retention: Retention,
        command_rx: mpsc::Receiver<EvaluatorCommand>,
    ) -> Self {
        Self {
            storage,
            events,
            thresholds,
            retention,
            rules: tips::default_rules(),
            command_rx,
            online: HashMap::new(),
            active_tips: HashMap::new(),
            job_scans: HashMap::new(),
            started: Utc::now(),
            last_cleanup: None,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting evaluator actor");

        let mut interval = time::interval(Duration::from_secs(self.thresholds.tick_secs));
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(EvaluatorCommand::TickNow { respond_to }) => {
                            let summary = self.tick().await;
                            let _ = respond_to.send(summary);
                        }
                        Some(EvaluatorCommand::GetTips { respond_to }) => {
                            let mut tips: Vec<Tip> = self.active_tips.values().cloned().collect();
                            tips.sort_by(|a, b| b.priority.cmp(&a.priority));
                            let _ = respond_to.send(tips);
                        }
                        Some(EvaluatorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("evaluator actor stopped");
    }

    /// One full evaluation pass over the fleet.
    async fn tick(&mut self) -> TickSummary {
        let now = Utc::now();
        let mut summary = TickSummary::default();
        let mut fresh_tips: HashMap<(String, TipScope), Tip> = HashMap::new();

        let agents = match self
            .storage
            .list_agents(AgentFilter {
                enabled: Some(true),
                ..Default::default()
            })
            .await
        {
            Ok(agents) => agents,
            Err(e) => {
                warn!("evaluation pass aborted, agent listing failed: {}", e);
                return summary;
            }
        };

        let since = now - chrono::Duration::days(self.thresholds.lookback_days as i64);
        let eval_timeout = Duration::from_secs(self.thresholds.agent_eval_timeout_secs);

        for agent in &agents {
            let snapshot = match time::timeout(
                eval_timeout,
                self.storage.agent_snapshot(agent.agent_id, since),
            )
            .await
            {
                Ok(Ok(Some(snapshot))) => snapshot,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    warn!("skipping {}: snapshot failed: {}", agent.hostname, e);
                    summary.agents_skipped += 1;
                    continue;
                }
                Err(_) => {
                    warn!("skipping {}: evaluation timed out", agent.hostname);
                    summary.agents_skipped += 1;
                    continue;
                }
            };

            let health = health::evaluate(
                &snapshot.agent,
                &snapshot.window_jobs,
                snapshot.totals,
                now,
                &self.thresholds,
            );

            self.track_liveness(&snapshot.agent, &health, now).await;
            self.report_job_outcomes(&snapshot.agent, now).await;

            let metrics = Self::agent_metrics(&snapshot, &health, now);
            for tip in tips::evaluate_rules(
                &self.rules,
                RuleCategory::Agent,
                &metrics,
                TipScope::Agent(snapshot.agent.agent_id),
            ) {
                fresh_tips.insert(tip.key(), tip);
            }

            summary.agents_evaluated += 1;
        }

        match stats::system_overview(&self.storage, &self.thresholds).await {
            Ok(overview) => {
                for tip in tips::evaluate_rules(
                    &self.rules,
                    RuleCategory::System,
                    &overview.metrics(),
                    TipScope::System,
                ) {
                    fresh_tips.insert(tip.key(), tip);
                }
            }
            Err(e) => warn!("system overview failed, skipping system rules: {}", e),
        }

        self.publish_tips(fresh_tips).await;
        summary.active_tips = self.active_tips.len();

        if self
            .last_cleanup
            .is_none_or(|last| now - last >= chrono::Duration::hours(CLEANUP_INTERVAL_HOURS))
        {
            if let Err(e) = self.events.cleanup(&self.retention).await {
                warn!("retention cleanup failed: {}", e);
            }
            self.last_cleanup = Some(now);
        }

        debug!(
            "evaluation pass complete: {} agents, {} skipped, {} tips",
            summary.agents_evaluated, summary.agents_skipped, summary.active_tips
        );
        summary
    }

    /// Record offline/online events on liveness transitions.
    async fn track_liveness(&mut self, agent: &Agent, health: &HealthSnapshot, now: DateTime<Utc>) {
        let previous = self.online.insert(agent.agent_id, health.online);

        let event = if !health.online && previous != Some(false) {
            let silence = util::format_duration((now - agent.last_seen).num_seconds() as f64);
            Some(NewEvent {
                category: EventCategory::Agent,
                event_type: "offline".to_string(),
                description: format!(
                    "Agent {} is offline, no heartbeat for {}",
                    agent.hostname, silence
                ),
                priority: Priority::High,
                agent_id: Some(agent.agent_id),
                backup_job_id: None,
                related_id: None,
                details: None,
            })
        } else if health.online && previous == Some(false) {
            Some(NewEvent {
                category: EventCategory::Agent,
                event_type: "online".to_string(),
                description: format!("Agent {} is back online", agent.hostname),
                priority: Priority::Medium,
                agent_id: Some(agent.agent_id),
                backup_job_id: None,
                related_id: None,
                details: None,
            })
        } else {
            None
        };

        if let Some(event) = event {
            info!("{}", event.description);
            if let Err(e) = self.events.record(event).await {
                warn!("failed to record liveness event for {}: {}", agent.hostname, e);
            }
        }
    }

    /// Raise backup events for outcomes recorded since the agent's last
    /// successful scan.
    ///
    /// Scans `[watermark, cutoff)` over the job's recording time, so
    /// consecutive passes see disjoint windows and each outcome is alerted
    /// at most once. The watermark only advances after a successful scan,
    /// and the query filters on recording time rather than run start, so
    /// neither a skipped pass nor a late report of an old run loses an
    /// alert.
    async fn report_job_outcomes(&mut self, agent: &Agent, cutoff: DateTime<Utc>) {
        let hostname = &agent.hostname;
        let watermark = self
            .job_scans
            .get(&agent.agent_id)
            .copied()
            .unwrap_or(self.started);

        let jobs = match self
            .storage
            .query_jobs(JobQuery {
                agent_id: Some(agent.agent_id),
                recorded_since: Some(watermark),
                ..Default::default()
            })
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("outcome scan for {} failed, will retry: {}", hostname, e);
                return;
            }
        };

        for job in &jobs {
            if job.created_at >= cutoff {
                continue;
            }

            let (event_type, priority, description) = match job.status {
                BackupStatus::Failed => (
                    "failed",
                    Priority::High,
                    format!(
                        "Backup failed on {}: {}",
                        hostname,
                        job.error_message.as_deref().unwrap_or("unknown error")
                    ),
                ),
                BackupStatus::Warning => (
                    "warning",
                    Priority::Medium,
                    format!("Backup finished with warnings on {}", hostname),
                ),
                _ => continue,
            };

            let event = NewEvent {
                category: EventCategory::Backup,
                event_type: event_type.to_string(),
                description,
                priority,
                agent_id: Some(agent.agent_id),
                backup_job_id: Some(job.job_id),
                related_id: None,
                details: Some(serde_json::json!({
                    "tool": job.tool,
                    "size_bytes": job.size_bytes,
                })),
            };

            if priority >= Priority::High {
                warn!("{}", event.description);
            }
            if let Err(e) = self.events.record(event).await {
                warn!("failed to record backup event for {}: {}", hostname, e);
            }
        }

        self.job_scans.insert(agent.agent_id, cutoff);
    }

    /// Replace the active tip set, notifying for newly matched tips at
    /// high priority or above.
    async fn publish_tips(&mut self, fresh: HashMap<(String, TipScope), Tip>) {
        for (key, tip) in &fresh {
            if self.active_tips.contains_key(key) || tip.priority < Priority::High {
                continue;
            }

            let (category, related_id) = match tip.scope {
                TipScope::Agent(agent_id) => (EventCategory::Agent, Some(agent_id.to_string())),
                TipScope::System => (EventCategory::System, None),
            };
            let message = tip
                .solutions
                .iter()
                .map(|s| s.title.as_str())
                .collect::<Vec<_>>()
                .join("; ");

            if let Err(e) = self
                .events
                .notify(tip.title.clone(), message, category, tip.priority, related_id)
                .await
            {
                warn!("failed to raise tip notification {}: {}", tip.rule_id, e);
            }
        }

        self.active_tips = fresh;
    }

    fn agent_metrics(snapshot: &AgentSnapshot, health: &HealthSnapshot, now: DateTime<Utc>) -> Metrics {
        let mut metrics = Metrics::from([
            (
                "success_rate".to_string(),
                MetricValue::Number(health.performance.success_rate),
            ),
            (
                "avg_duration_seconds".to_string(),
                MetricValue::Number(health.performance.avg_duration_secs),
            ),
            (
                "failed_backups".to_string(),
                MetricValue::Number(health.totals.failed as f64),
            ),
            (
                "total_backups".to_string(),
                MetricValue::Number(health.totals.total as f64),
            ),
            (
                "status".to_string(),
                MetricValue::Text(if health.online { "online" } else { "offline" }.to_string()),
            ),
        ]);

        if !health.online {
            let offline_secs = (now - snapshot.agent.last_seen).num_seconds().max(0) as f64;
            metrics.insert(
                "offline_duration_seconds".to_string(),
                MetricValue::Number(offline_secs),
            );
        }

        metrics
    }
}

/// Handle for the evaluator actor
///
/// Cloneable, typed command API over the actor's mpsc channel.
#[derive(Clone)]
pub struct EvaluatorHandle {
    sender: mpsc::Sender<EvaluatorCommand>,
}

impl EvaluatorHandle {
    /// Spawn the evaluator as a tokio task and return its handle.
    pub fn spawn(
        storage: Arc<dyn StorageBackend>,
        events: EventRecorder,
        thresholds: Thresholds,
        retention: Retention,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = EvaluatorActor::new(storage, events, thresholds, retention, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run an evaluation pass immediately, bypassing the interval timer.
    pub async fn tick_now(&self) -> Result<TickSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EvaluatorCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        rx.await.context("failed to receive tick summary")
    }

    /// Fetch the currently active tips, highest priority first.
    pub async fn tips(&self) -> Result<Vec<Tip>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EvaluatorCommand::GetTips { respond_to: tx })
            .await
            .context("failed to send GetTips command")?;

        rx.await.context("failed to receive tips")
    }

    /// Gracefully shut down the evaluator.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(EvaluatorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
