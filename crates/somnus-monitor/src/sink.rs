//! Outbound alert delivery
//!
//! The [`AlertDispatcher`] decouples the monitor tick from the sink: alerts
//! are queued with `try_send` and delivered by a background worker, so a slow
//! or unavailable sink can never block a tick.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use somnus_types::{Alert, AlertSeverity};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Error)]
#[error("Alert sink failed: {0}")]
pub struct SinkError(pub String);

/// Destination for raised alerts. Best-effort.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), SinkError>;
}

/// Why an alert was not queued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("alert queue is full")]
    QueueFull,

    #[error("alert sink is unavailable")]
    SinkUnavailable,
}

/// Non-blocking front of an [`AlertSink`]
pub struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
    pending: Mutex<Option<(mpsc::Receiver<Alert>, Arc<dyn AlertSink>)>>,
}

impl AlertDispatcher {
    /// Create a dispatcher. The delivery worker starts on first dispatch.
    pub fn new(sink: Arc<dyn AlertSink>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            pending: Mutex::new(Some((rx, sink))),
        }
    }

    /// Queue an alert without waiting. Must be called within a Tokio runtime.
    pub fn dispatch(&self, alert: Alert) -> Result<(), DispatchError> {
        self.ensure_worker();
        match self.tx.try_send(alert) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(alert)) => {
                warn!(alert_id = %alert.id, alert_type = %alert.alert_type, "Alert queue full, dropping alert");
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(alert)) => {
                warn!(alert_id = %alert.id, alert_type = %alert.alert_type, "Alert sink unavailable, dropping alert");
                Err(DispatchError::SinkUnavailable)
            }
        }
    }

    fn ensure_worker(&self) {
        let Some((mut rx, sink)) = self.pending.lock().take() else {
            return;
        };
        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                if let Err(e) = sink.notify(&alert).await {
                    warn!(alert_id = %alert.id, error = %e, "Alert sink rejected alert");
                }
            }
            debug!("Alert delivery worker stopped");
        });
    }
}

/// Sink that writes alerts to the log.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), SinkError> {
        match alert.severity {
            AlertSeverity::Critical => error!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                message = %alert.message,
                "ALERT"
            ),
            AlertSeverity::Warning => warn!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                message = %alert.message,
                "ALERT"
            ),
            AlertSeverity::Info => info!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                message = %alert.message,
                "ALERT"
            ),
        }
        Ok(())
    }
}

/// Sink that keeps delivered alerts in memory.
#[derive(Default)]
pub struct MemoryAlertSink {
    delivered: RwLock<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Alert> {
        self.delivered.read().clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), SinkError> {
        self.delivered.write().push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use somnus_types::AlertType;
    use std::time::Duration;

    struct StuckSink;

    #[async_trait]
    impl AlertSink for StuckSink {
        async fn notify(&self, _alert: &Alert) -> Result<(), SinkError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn alert() -> Alert {
        Alert::new(AlertType::HighCpuUsage, "cpu 95%", Utc::now())
    }

    #[tokio::test]
    async fn test_delivers_to_sink() {
        let sink = Arc::new(MemoryAlertSink::new());
        let dispatcher = AlertDispatcher::new(sink.clone(), 4);

        dispatcher.dispatch(alert()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while sink.delivered().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("alert not delivered");
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let dispatcher = AlertDispatcher::new(Arc::new(StuckSink), 1);

        // The worker has not run yet, so the single slot fills up.
        assert!(dispatcher.dispatch(alert()).is_ok());
        assert_eq!(dispatcher.dispatch(alert()), Err(DispatchError::QueueFull));
    }
}
