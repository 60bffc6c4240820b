//! Agent liveness and health evaluation
//!
//! Pure functions over an agent snapshot; no storage or clock access, the
//! caller supplies `now`. The evaluator actor feeds this from consistent
//! storage snapshots, the API calls it for on-demand health reads.
//!
//! Scoring starts at 100 and subtracts a fixed penalty per detected issue
//! (30 for a high all-time failure rate, 40 for not reporting, 20 for a
//! low windowed success rate), then subtracts half a point per percentage
//! point the windowed success rate falls short of 80. A low success rate
//! is therefore penalized twice, once as an issue and once proportionally.
//! Agents seen within the liveness timeout get a 10 point bonus. The
//! result is clamped to [0, 100].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::{Agent, BackupJob, BackupStatus, JobStats};
use crate::util::round2;

/// Issues detected during health evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    /// All-time failed jobs exceed 30% of all-time total
    HighFailureRate,

    /// No heartbeat within the not-reporting threshold
    NotReporting,

    /// Windowed success rate below 80%
    LowSuccessRate,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::HighFailureRate => write!(f, "high_failure_rate"),
            Issue::NotReporting => write!(f, "not_reporting"),
            Issue::LowSuccessRate => write!(f, "low_success_rate"),
        }
    }
}

/// Windowed performance figures for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Percentage of window jobs that succeeded, rounded to 2 decimals.
    /// 0 when the window is empty.
    pub success_rate: f64,

    /// Mean duration in seconds across finished window jobs. Jobs still
    /// running are excluded. 0 when no window job has finished.
    pub avg_duration_secs: f64,

    pub total_size_gb: f64,

    pub window_jobs: u64,
}

/// Full health evaluation result for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub online: bool,
    pub performance: Performance,
    pub totals: JobStats,
    pub issues: Vec<Issue>,
    /// Clamped to [0, 100]
    pub score: f64,
}

impl HealthSnapshot {
    pub fn has_issue(&self, issue: Issue) -> bool {
        self.issues.contains(&issue)
    }
}

/// Whether the agent counts as online at `now`.
pub fn is_online(agent: &Agent, now: DateTime<Utc>, thresholds: &Thresholds) -> bool {
    agent.last_seen > now - Duration::minutes(thresholds.liveness_timeout_minutes as i64)
}

/// Windowed performance over the lookback jobs.
pub fn performance(window_jobs: &[BackupJob]) -> Performance {
    if window_jobs.is_empty() {
        return Performance {
            success_rate: 0.0,
            avg_duration_secs: 0.0,
            total_size_gb: 0.0,
            window_jobs: 0,
        };
    }

    let total = window_jobs.len() as f64;
    let success = window_jobs
        .iter()
        .filter(|j| j.status == BackupStatus::Success)
        .count() as f64;
    let durations: Vec<f64> = window_jobs.iter().filter_map(|j| j.duration_secs()).collect();
    let avg_duration = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };
    let total_size: u64 = window_jobs.iter().map(|j| j.size_bytes).sum();

    Performance {
        success_rate: round2(success / total * 100.0),
        avg_duration_secs: round2(avg_duration),
        total_size_gb: round2(total_size as f64 / (1024u64.pow(3)) as f64),
        window_jobs: total as u64,
    }
}

/// Evaluate an agent's health from a consistent snapshot.
pub fn evaluate(
    agent: &Agent,
    window_jobs: &[BackupJob],
    totals: JobStats,
    now: DateTime<Utc>,
    thresholds: &Thresholds,
) -> HealthSnapshot {
    let online = is_online(agent, now, thresholds);
    let performance = performance(window_jobs);

    let mut issues = Vec::new();
    if totals.failed as f64 > totals.total as f64 * 0.3 {
        issues.push(Issue::HighFailureRate);
    }
    if agent.last_seen < now - Duration::minutes(thresholds.not_reporting_minutes as i64) {
        issues.push(Issue::NotReporting);
    }
    if performance.success_rate < 80.0 {
        issues.push(Issue::LowSuccessRate);
    }

    let mut score = 100.0;
    for issue in &issues {
        score -= match issue {
            Issue::HighFailureRate => 30.0,
            Issue::NotReporting => 40.0,
            Issue::LowSuccessRate => 20.0,
        };
    }
    if performance.success_rate < 80.0 {
        score -= (80.0 - performance.success_rate) * 0.5;
    }
    if online {
        score += 10.0;
    }

    HealthSnapshot {
        online,
        performance,
        totals,
        issues,
        score: score.clamp(0.0, 100.0),
    }
}
