//! Alert types
//!
//! Alerts are append-only log entries raised by the monitor loop. They end
//! only through explicit acknowledgement.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AlertId;

/// Kind of alert raised by the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighCpuUsage,
    HighMemoryUsage,
    TooManySleeping,
    CriticalSleeping,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::HighCpuUsage => "HIGH_CPU_USAGE",
            AlertType::HighMemoryUsage => "HIGH_MEMORY_USAGE",
            AlertType::TooManySleeping => "TOO_MANY_SLEEPING",
            AlertType::CriticalSleeping => "CRITICAL_SLEEPING",
        }
    }

    /// Default severity for this alert type.
    pub fn default_severity(self) -> AlertSeverity {
        match self {
            AlertType::CriticalSleeping => AlertSeverity::Critical,
            _ => AlertSeverity::Warning,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A monitor alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub acknowledged: bool,
}

impl Alert {
    /// Create an unacknowledged alert with the type's default severity.
    pub fn new(alert_type: AlertType, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::generate(),
            timestamp,
            alert_type,
            severity: alert_type.default_severity(),
            message: message.into(),
            acknowledged: false,
        }
    }
}
