//! Rule-driven remediation tips
//!
//! A small database of diagnostic rules matched against metric maps. Agent
//! rules run against each agent's health metrics, system rules against the
//! fleet-wide overview. Rules are data, not code: a rule is a set of
//! conditions that must all hold, and matching produces a tip carrying
//! ranked solutions.
//!
//! A condition referencing a metric absent from the map never matches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Priority;

/// Comparison operator of a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Lt,
    Gt,
    Eq,
    Ne,
}

/// A metric value rules can compare against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Number(v as f64)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// Map of metric name to current value.
pub type Metrics = HashMap<String, MetricValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    pub operator: Operator,
    pub value: MetricValue,
}

impl Condition {
    pub fn matches(&self, metrics: &Metrics) -> bool {
        let Some(actual) = metrics.get(&self.metric) else {
            return false;
        };

        match (actual, &self.value) {
            (MetricValue::Number(a), MetricValue::Number(b)) => match self.operator {
                Operator::Lt => a < b,
                Operator::Gt => a > b,
                Operator::Eq => a == b,
                Operator::Ne => a != b,
            },
            (MetricValue::Text(a), MetricValue::Text(b)) => match self.operator {
                Operator::Eq => a == b,
                Operator::Ne => a != b,
                // ordering comparisons are undefined for text metrics
                _ => false,
            },
            _ => false,
        }
    }
}

/// One recommended remediation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

/// External documentation link attached to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
}

/// What a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Agent,
    System,
}

/// A diagnostic rule: all conditions must hold for the tip to fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub title: String,
    pub category: RuleCategory,
    pub conditions: Vec<Condition>,
    pub solutions: Vec<Solution>,
    pub resources: Vec<Resource>,
}

impl Rule {
    pub fn matches(&self, metrics: &Metrics) -> bool {
        self.conditions.iter().all(|c| c.matches(metrics))
    }

    /// A rule's priority is the highest priority among its solutions.
    pub fn priority(&self) -> Priority {
        self.solutions
            .iter()
            .map(|s| s.priority)
            .max()
            .unwrap_or(Priority::Low)
    }
}

/// Subject of a produced tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "agent_id")]
pub enum TipScope {
    Agent(Uuid),
    System,
}

/// A matched rule bound to its subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub rule_id: String,
    pub title: String,
    pub scope: TipScope,
    pub priority: Priority,
    pub solutions: Vec<Solution>,
    pub resources: Vec<Resource>,
}

impl Tip {
    /// Deduplication key: one active tip per rule and subject.
    pub fn key(&self) -> (String, TipScope) {
        (self.rule_id.clone(), self.scope)
    }
}

/// Evaluate all rules of one category against a metric map.
pub fn evaluate_rules(rules: &[Rule], category: RuleCategory, metrics: &Metrics, scope: TipScope) -> Vec<Tip> {
    rules
        .iter()
        .filter(|r| r.category == category && r.matches(metrics))
        .map(|r| Tip {
            rule_id: r.id.clone(),
            title: r.title.clone(),
            scope,
            priority: r.priority(),
            solutions: r.solutions.clone(),
            resources: r.resources.clone(),
        })
        .collect()
}

fn solution(title: &str, description: &str, priority: Priority) -> Solution {
    Solution {
        title: title.to_string(),
        description: description.to_string(),
        priority,
    }
}

fn condition(metric: &str, operator: Operator, value: impl Into<MetricValue>) -> Condition {
    Condition {
        metric: metric.to_string(),
        operator,
        value: value.into(),
    }
}

/// Built-in rule database.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "backup_slow_performance".to_string(),
            title: "Improve Slow Backup Performance".to_string(),
            category: RuleCategory::Agent,
            conditions: vec![
                condition("avg_duration_seconds", Operator::Gt, 3600.0),
                condition("success_rate", Operator::Lt, 90.0),
            ],
            solutions: vec![
                solution(
                    "Tune Exclusion Patterns",
                    "Exclude temporary files, caches and downloads that do not need to be backed up",
                    Priority::High,
                ),
                solution(
                    "Adjust Compression",
                    "Lower or disable compression for directories holding already-compressed data (images, videos, archives)",
                    Priority::Medium,
                ),
                solution(
                    "Check Network Throughput",
                    "Measure the link speed between the agent and the backup destination",
                    Priority::Medium,
                ),
            ],
            resources: vec![Resource {
                title: "Backup Optimization Guide".to_string(),
                url: "https://custodia.docs/optimization".to_string(),
            }],
        },
        Rule {
            id: "backup_high_failure_rate".to_string(),
            title: "Reduce Backup Failure Rate".to_string(),
            category: RuleCategory::Agent,
            conditions: vec![
                condition("success_rate", Operator::Lt, 80.0),
                condition("failed_backups", Operator::Gt, 3.0),
            ],
            solutions: vec![
                solution(
                    "Check Access Permissions",
                    "Make sure the agent service has read access to every source directory",
                    Priority::Critical,
                ),
                solution(
                    "Raise Execution Timeout",
                    "Increase the run timeout for backups covering large data volumes",
                    Priority::High,
                ),
                solution(
                    "Check Free Disk Space",
                    "Verify both the source and the destination have enough free space",
                    Priority::Critical,
                ),
            ],
            resources: vec![Resource {
                title: "Troubleshooting Guide".to_string(),
                url: "https://custodia.docs/troubleshooting".to_string(),
            }],
        },
        Rule {
            id: "agent_offline".to_string(),
            title: "Agent Offline for an Extended Period".to_string(),
            category: RuleCategory::Agent,
            conditions: vec![
                condition("status", Operator::Eq, "offline"),
                condition("offline_duration_seconds", Operator::Gt, 3600.0),
            ],
            solutions: vec![
                solution(
                    "Check the Agent Service",
                    "Restart the backup agent service on the host",
                    Priority::Critical,
                ),
                solution(
                    "Check Network Connectivity",
                    "Verify the machine can reach the hub",
                    Priority::High,
                ),
                solution(
                    "Check Firewall Rules",
                    "Make sure the hub API port is reachable from the agent",
                    Priority::High,
                ),
            ],
            resources: vec![Resource {
                title: "Agent Installation Manual".to_string(),
                url: "https://custodia.docs/agent-installation".to_string(),
            }],
        },
        Rule {
            id: "storage_low_space".to_string(),
            title: "Backup Storage Running Low".to_string(),
            category: RuleCategory::System,
            conditions: vec![condition("storage_usage_percent", Operator::Gt, 90.0)],
            solutions: vec![
                solution(
                    "Grow Storage Capacity",
                    "Add storage to the hub or migrate backups to external storage",
                    Priority::Critical,
                ),
                solution(
                    "Prune Old Backups",
                    "Configure retention policies to remove old backups automatically",
                    Priority::High,
                ),
                solution(
                    "Tune Deduplication",
                    "Enable or adjust data deduplication to reduce space usage",
                    Priority::Medium,
                ),
            ],
            resources: vec![Resource {
                title: "Retention Policy Configuration".to_string(),
                url: "https://custodia.docs/retention-policies".to_string(),
            }],
        },
    ]
}
