//! Fleet-wide overview statistics
//!
//! Aggregates agent counts, backup outcomes and storage consumption into
//! one summary used by the overview endpoint and by the system tip rules.
//! Storage capacity is not measured from disk, it comes from configuration
//! (with a 1 TB default) and usage is the sum of reported backup sizes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::health::is_online;
use crate::storage::{AgentFilter, StorageBackend, StorageError};
use crate::tips::{MetricValue, Metrics};
use crate::util::round2;
use crate::BackupStatus;

const GIB: f64 = (1024u64 * 1024 * 1024) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageOverview {
    pub capacity_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub usage_percent: f64,
}

/// Snapshot of the whole fleet at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemOverview {
    pub total_agents: u64,
    pub online_agents: u64,
    pub total_backups: u64,
    /// All-time success percentage, 0 with no backups
    pub success_rate: f64,
    pub failed_backups: u64,
    pub running_backups: u64,
    pub total_size_gb: f64,
    /// Mean bytes per day over the last 7 days, in GB
    pub daily_growth_gb: f64,
    pub storage: StorageOverview,
}

impl SystemOverview {
    /// Metric map consumed by the system tip rules.
    pub fn metrics(&self) -> Metrics {
        Metrics::from([
            (
                "storage_usage_percent".to_string(),
                MetricValue::Number(self.storage.usage_percent),
            ),
            (
                "total_agents".to_string(),
                MetricValue::Number(self.total_agents as f64),
            ),
            (
                "online_agents".to_string(),
                MetricValue::Number(self.online_agents as f64),
            ),
            (
                "success_rate".to_string(),
                MetricValue::Number(self.success_rate),
            ),
        ])
    }
}

/// Compute the fleet overview from storage.
pub async fn system_overview(
    storage: &Arc<dyn StorageBackend>,
    thresholds: &Thresholds,
) -> Result<SystemOverview, StorageError> {
    let now = Utc::now();

    let agents = storage.list_agents(AgentFilter::default()).await?;
    let total_agents = agents.len() as u64;
    let online_agents = agents
        .iter()
        .filter(|a| is_online(a, now, thresholds))
        .count() as u64;

    let total_backups = storage.count_jobs(None, None, None).await?;
    let success_backups = storage
        .count_jobs(Some(BackupStatus::Success), None, None)
        .await?;
    let failed_backups = storage
        .count_jobs(Some(BackupStatus::Failed), None, None)
        .await?;
    let running_backups = storage
        .count_jobs(Some(BackupStatus::Running), None, None)
        .await?;

    let success_rate = if total_backups > 0 {
        round2(success_backups as f64 / total_backups as f64 * 100.0)
    } else {
        0.0
    };

    let total_size_bytes = storage.sum_job_sizes(None, None).await?;
    let total_size_gb = round2(total_size_bytes as f64 / GIB);

    let week_size_bytes = storage
        .sum_job_sizes(None, Some(now - Duration::days(7)))
        .await?;
    let daily_growth_gb = round2(week_size_bytes as f64 / 7.0 / GIB);

    let capacity_gb = thresholds.storage_capacity_gb;
    let used_gb = total_size_gb;
    let usage_percent = if capacity_gb > 0.0 {
        round2(used_gb / capacity_gb * 100.0)
    } else {
        0.0
    };
    let storage_overview = StorageOverview {
        capacity_gb,
        used_gb,
        free_gb: round2(capacity_gb - used_gb),
        usage_percent,
    };

    Ok(SystemOverview {
        total_agents,
        online_agents,
        total_backups,
        success_rate,
        failed_backups,
        running_backups,
        total_size_gb,
        daily_growth_gb,
        storage: storage_overview,
    })
}
