//! Monitor loop

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use somnus_graph::DependencyGraph;
use somnus_registry::RegistryStore;
use somnus_risk::RiskAnalyzer;
use somnus_types::{
    Alert, AlertId, AlertType, EventSeverity, EventSource, FunctionId, FunctionRecord,
    SomnusEvent, SomnusEventEnvelope,
};
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::AlertLog;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::{MetricsSample, MetricsSource};
use crate::sink::{AlertDispatcher, AlertSink};

/// What a single tick observed and did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub sample: Option<MetricsSample>,
    pub sleeping: Option<usize>,
    pub critical_sleeping: Option<usize>,
    /// Alerts raised this tick
    pub alerts: Vec<Alert>,
    /// Breaches suppressed by the cooldown
    pub suppressed: Vec<AlertType>,
    /// Alerts that could not be queued for the sink
    pub dropped: Vec<AlertId>,
    /// Proposed sleep candidates, safest first
    pub candidates: Vec<FunctionId>,
    /// Failures caught during the tick
    pub errors: Vec<String>,
}

/// Periodic monitor
pub struct MonitorLoop {
    config: MonitorConfig,
    store: Arc<dyn RegistryStore>,
    metrics: Arc<dyn MetricsSource>,
    analyzer: RiskAnalyzer,
    alerts: AlertLog,
    dispatcher: AlertDispatcher,
    last_proposal: RwLock<Vec<FunctionId>>,
    event_tx: broadcast::Sender<SomnusEventEnvelope>,
}

impl MonitorLoop {
    pub fn new(
        config: MonitorConfig,
        store: Arc<dyn RegistryStore>,
        metrics: Arc<dyn MetricsSource>,
        sink: Arc<dyn AlertSink>,
        analyzer: RiskAnalyzer,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let alerts = AlertLog::new(config.alert_cooldown(), config.alert_retention());
        let dispatcher = AlertDispatcher::new(sink, config.alert_queue_capacity);
        Self {
            config,
            store,
            metrics,
            analyzer,
            alerts,
            dispatcher,
            last_proposal: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<SomnusEventEnvelope> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn alert_log(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn acknowledge_alert(&self, id: AlertId) -> Result<Alert> {
        self.alerts.acknowledge(id)
    }

    /// Candidates from the most recent tick.
    pub fn last_proposal(&self) -> Vec<FunctionId> {
        self.last_proposal.read().clone()
    }

    /// Run one tick. Never fails; problems are logged and reported.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let now = Utc::now();
        let mut report = TickReport::default();

        match self.metrics.sample().await {
            Ok(sample) => report.sample = Some(sample),
            Err(e) => {
                warn!(error = %e, "Metrics sample failed");
                report.errors.push(e.to_string());
            }
        }

        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => {
                let sleeping = snapshot.iter().filter(|r| r.is_sleeping()).count();
                let critical_sleeping = snapshot
                    .iter()
                    .filter(|r| r.is_sleeping() && r.is_critical)
                    .count();
                report.sleeping = Some(sleeping);
                report.critical_sleeping = Some(critical_sleeping);
                Some(snapshot)
            }
            Err(e) => {
                error!(error = %e, "Registry snapshot failed");
                report.errors.push(e.to_string());
                None
            }
        };

        for (alert_type, message) in self.breaches(&report) {
            match self.alerts.raise(alert_type, message, now) {
                Some(alert) => self.publish(alert, &mut report),
                None => report.suppressed.push(alert_type),
            }
        }

        if let Some(snapshot) = snapshot {
            report.candidates = self.propose(&snapshot);
        }

        self.alerts.archive_expired(now);
        self.finish(&report, now);
        report
    }

    /// One (type, message) per breached threshold.
    fn breaches(&self, report: &TickReport) -> Vec<(AlertType, String)> {
        let limits = &self.config.thresholds;
        let mut breaches = Vec::new();

        if let Some(sample) = report.sample {
            if sample.cpu_percent > limits.cpu_percent {
                breaches.push((
                    AlertType::HighCpuUsage,
                    format!(
                        "CPU usage {:.1}% exceeds {:.1}%",
                        sample.cpu_percent, limits.cpu_percent
                    ),
                ));
            }
            if sample.memory_percent > limits.memory_percent {
                breaches.push((
                    AlertType::HighMemoryUsage,
                    format!(
                        "Memory usage {:.1}% exceeds {:.1}%",
                        sample.memory_percent, limits.memory_percent
                    ),
                ));
            }
        }
        if let Some(sleeping) = report.sleeping {
            if sleeping > limits.sleeping_count {
                breaches.push((
                    AlertType::TooManySleeping,
                    format!(
                        "{} functions sleeping, limit {}",
                        sleeping, limits.sleeping_count
                    ),
                ));
            }
        }
        if let Some(critical) = report.critical_sleeping {
            if critical > limits.critical_sleeping_count {
                breaches.push((
                    AlertType::CriticalSleeping,
                    format!("{} critical functions sleeping", critical),
                ));
            }
        }
        breaches
    }

    fn publish(&self, alert: Alert, report: &mut TickReport) {
        info!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            message = %alert.message,
            "Alert raised"
        );
        let severity = match alert.severity {
            somnus_types::AlertSeverity::Critical => EventSeverity::Critical,
            somnus_types::AlertSeverity::Warning => EventSeverity::Warning,
            somnus_types::AlertSeverity::Info => EventSeverity::Info,
        };
        self.emit(severity, SomnusEvent::AlertRaised { alert: alert.clone() });

        let (id, alert_type) = (alert.id, alert.alert_type);
        if let Err(e) = self.dispatcher.dispatch(alert.clone()) {
            report.dropped.push(id);
            self.emit(
                EventSeverity::Warning,
                SomnusEvent::AlertDropped {
                    alert_type,
                    reason: e.to_string(),
                },
            );
        }
        report.alerts.push(alert);
    }

    fn propose(&self, snapshot: &[FunctionRecord]) -> Vec<FunctionId> {
        let graph = DependencyGraph::build(snapshot);
        let candidates =
            self.analyzer
                .propose_sleep_candidates(snapshot, &graph, self.config.proposal_batch);

        if !candidates.is_empty() {
            debug!(count = candidates.len(), "Sleep candidates proposed");
            self.emit(
                EventSeverity::Info,
                SomnusEvent::SleepCandidatesProposed {
                    candidates: candidates.clone(),
                },
            );
        }
        *self.last_proposal.write() = candidates.clone();
        candidates
    }

    fn finish(&self, report: &TickReport, now: DateTime<Utc>) {
        debug!(
            at = %now,
            cpu = report.sample.map(|s| s.cpu_percent),
            memory = report.sample.map(|s| s.memory_percent),
            sleeping = report.sleeping,
            critical_sleeping = report.critical_sleeping,
            alerts = report.alerts.len(),
            suppressed = report.suppressed.len(),
            "Monitor tick complete"
        );
        self.emit(
            EventSeverity::Debug,
            SomnusEvent::MonitorTick {
                cpu_percent: report.sample.map(|s| s.cpu_percent),
                memory_percent: report.sample.map(|s| s.memory_percent),
                sleeping: report.sleeping.unwrap_or(0),
                critical_sleeping: report.critical_sleeping.unwrap_or(0),
            },
        );
    }

    fn emit(&self, severity: EventSeverity, event: SomnusEvent) {
        let _ = self
            .event_tx
            .send(SomnusEventEnvelope::new(EventSource::Monitor, severity, event));
    }

    /// Start the periodic task. The first tick runs immediately.
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.config.interval_secs, "Monitor loop started");

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        // A stop request during the tick is seen on the next iteration.
                        self.tick().await;
                    }
                }
            }

            info!("Monitor loop stopped");
        });

        MonitorHandle { stop_tx, handle }
    }
}

/// Handle to a running monitor loop
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    /// Ask the loop to stop after the current tick and wait for it.
    pub async fn stop(self) -> std::result::Result<(), JoinError> {
        let _ = self.stop_tx.send(true);
        self.handle.await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
