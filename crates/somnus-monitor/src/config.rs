//! Monitor configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monitor loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Alert thresholds
    #[serde(default)]
    pub thresholds: AlertThresholds,

    /// An unacknowledged alert suppresses its type for this many seconds
    #[serde(default = "default_alert_cooldown_secs")]
    pub alert_cooldown_secs: u64,

    /// Acknowledged alerts older than this are archived
    #[serde(default = "default_alert_retention_secs")]
    pub alert_retention_secs: u64,

    /// Maximum sleep candidates proposed per tick
    #[serde(default = "default_proposal_batch")]
    pub proposal_batch: usize,

    /// Capacity of the outbound alert queue
    #[serde(default = "default_alert_queue_capacity")]
    pub alert_queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            thresholds: AlertThresholds::default(),
            alert_cooldown_secs: default_alert_cooldown_secs(),
            alert_retention_secs: default_alert_retention_secs(),
            proposal_batch: default_proposal_batch(),
            alert_queue_capacity: default_alert_queue_capacity(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn alert_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.alert_cooldown_secs as i64)
    }

    pub fn alert_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.alert_retention_secs as i64)
    }
}

/// Thresholds above which an alert is raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: f64,

    #[serde(default = "default_memory_percent")]
    pub memory_percent: f64,

    /// Sleeping functions tolerated
    #[serde(default = "default_sleeping_count")]
    pub sleeping_count: usize,

    /// Sleeping critical functions tolerated
    #[serde(default)]
    pub critical_sleeping_count: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_percent(),
            memory_percent: default_memory_percent(),
            sleeping_count: default_sleeping_count(),
            critical_sleeping_count: 0,
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_alert_cooldown_secs() -> u64 {
    5 * 60
}

fn default_alert_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_proposal_batch() -> usize {
    20
}

fn default_alert_queue_capacity() -> usize {
    256
}

fn default_cpu_percent() -> f64 {
    80.0
}

fn default_memory_percent() -> f64 {
    85.0
}

fn default_sleeping_count() -> usize {
    50
}
