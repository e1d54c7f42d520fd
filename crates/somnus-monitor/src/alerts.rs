//! Alert log with cooldown de-duplication
//!
//! Alerts are append-only. They leave the active log only by being
//! acknowledged and then aging past the retention window, at which point
//! they move to the archive. Nothing is ever deleted.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use somnus_types::{Alert, AlertId, AlertType};
use tracing::{debug, info};

use crate::error::{MonitorError, Result};

#[derive(Default)]
struct LogState {
    active: Vec<Alert>,
    archived: Vec<Alert>,
}

/// Append-only alert log
pub struct AlertLog {
    cooldown: Duration,
    retention: Duration,
    state: RwLock<LogState>,
}

impl AlertLog {
    pub fn new(cooldown: Duration, retention: Duration) -> Self {
        Self {
            cooldown,
            retention,
            state: RwLock::new(LogState::default()),
        }
    }

    /// Record a new alert unless its type is cooling down.
    ///
    /// A type cools down while an unacknowledged alert of that type is younger
    /// than the cooldown window. Returns the recorded alert, or `None` when
    /// suppressed.
    pub fn raise(
        &self,
        alert_type: AlertType,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let mut state = self.state.write();

        let cooling = state.active.iter().any(|a| {
            a.alert_type == alert_type && !a.acknowledged && now - a.timestamp < self.cooldown
        });
        if cooling {
            debug!(alert_type = %alert_type, "Alert suppressed by cooldown");
            return None;
        }

        let alert = Alert::new(alert_type, message, now);
        state.active.push(alert.clone());
        Some(alert)
    }

    /// Mark an alert acknowledged. Acknowledging twice is a no-op.
    pub fn acknowledge(&self, id: AlertId) -> Result<Alert> {
        let mut state = self.state.write();
        let alert = state
            .active
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(MonitorError::AlertNotFound(id))?;
        if !alert.acknowledged {
            alert.acknowledged = true;
            info!(alert_id = %id, alert_type = %alert.alert_type, "Alert acknowledged");
        }
        Ok(alert.clone())
    }

    /// Move acknowledged alerts older than the retention window to the archive.
    pub fn archive_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let (expired, kept): (Vec<Alert>, Vec<Alert>) = std::mem::take(&mut state.active)
            .into_iter()
            .partition(|a| a.acknowledged && now - a.timestamp >= self.retention);
        state.active = kept;

        let count = expired.len();
        state.archived.extend(expired);
        if count > 0 {
            debug!(archived = count, "Archived expired alerts");
        }
        count
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.read().active.clone()
    }

    pub fn unacknowledged(&self) -> Vec<Alert> {
        self.state
            .read()
            .active
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    pub fn archived(&self) -> Vec<Alert> {
        self.state.read().archived.clone()
    }
}
