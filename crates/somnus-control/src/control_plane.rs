//! Main SomnusControlPlane implementation
//!
//! The SomnusControlPlane is the single entry point for operators and the
//! daemon. It composes the registry, risk analyzer, lifecycle controller,
//! monitor loop and wake orchestrator, and merges their events into one
//! stream.

use std::sync::Arc;

use parking_lot::Mutex;
use somnus_graph::DependencyGraph;
use somnus_lifecycle::{AuditSink, ComponentRuntime, LifecycleConfig, LifecycleController};
use somnus_monitor::{AlertSink, MetricsSource, MonitorConfig, MonitorHandle, MonitorLoop, TickReport};
use somnus_registry::RegistryStore;
use somnus_risk::{RiskAnalyzer, RiskAssessment, RiskConfig};
use somnus_types::{
    Alert, AlertId, EventSource, FunctionFilter, FunctionId, FunctionMeta, FunctionRecord, RiskFinding,
    SomnusEvent, SomnusEventEnvelope, TransitionAction, TransitionOptions, TransitionOutcome,
    WakeReason,
};
use somnus_wake::{WakeConfig, WakeOrchestrator, WakeReport};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{ControlPlaneError, Result};
use crate::events::{EventAggregator, EventForwarderBuilder, ForwardStats};

/// Unified control plane for all Somnus operations
pub struct SomnusControlPlane {
    store: Arc<dyn RegistryStore>,
    analyzer: RiskAnalyzer,
    controller: Arc<LifecycleController>,
    orchestrator: WakeOrchestrator,
    monitor: Arc<MonitorLoop>,
    monitor_handle: Mutex<Option<MonitorHandle>>,
    event_aggregator: EventAggregator,
    forwarders: Mutex<Vec<JoinHandle<ForwardStats>>>,
}

impl SomnusControlPlane {
    /// Create a control plane. Prefer [`crate::SomnusControlPlaneBuilder`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        metrics: Arc<dyn MetricsSource>,
        alert_sink: Arc<dyn AlertSink>,
        runtime: Arc<dyn ComponentRuntime>,
        audit: Arc<dyn AuditSink>,
        lifecycle_config: LifecycleConfig,
        monitor_config: MonitorConfig,
        wake_config: WakeConfig,
        risk_config: RiskConfig,
    ) -> Self {
        let analyzer = RiskAnalyzer::new(risk_config);
        let controller = Arc::new(LifecycleController::new(
            lifecycle_config,
            store.clone(),
            runtime,
            audit,
        ));
        let orchestrator = WakeOrchestrator::new(wake_config, controller.clone());
        let monitor = Arc::new(MonitorLoop::new(
            monitor_config,
            store.clone(),
            metrics,
            alert_sink,
            analyzer.clone(),
        ));

        let event_aggregator = EventAggregator::new();
        let forwarders = if tokio::runtime::Handle::try_current().is_ok() {
            EventForwarderBuilder::new(event_aggregator.clone())
                .add_source(controller.subscribe(), EventSource::Lifecycle)
                .add_source(monitor.subscribe(), EventSource::Monitor)
                .add_source(orchestrator.subscribe(), EventSource::Wake)
                .build()
        } else {
            debug!("No runtime available, subsystem events will not be aggregated");
            Vec::new()
        };

        Self {
            store,
            analyzer,
            controller,
            orchestrator,
            monitor,
            monitor_handle: Mutex::new(None),
            event_aggregator,
            forwarders: Mutex::new(forwarders),
        }
    }

    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    pub fn lifecycle_config(&self) -> &LifecycleConfig {
        self.controller.config()
    }

    pub fn monitor_config(&self) -> &MonitorConfig {
        self.monitor.config()
    }

    pub fn wake_config(&self) -> &WakeConfig {
        self.orchestrator.config()
    }

    // ========== Registry Operations ==========

    /// Register a new function. It starts Active at version 1.
    pub async fn register_function(&self, meta: FunctionMeta) -> Result<FunctionRecord> {
        Ok(self.controller.register(meta).await?)
    }

    pub async fn get_function(&self, id: &FunctionId) -> Result<FunctionRecord> {
        Ok(self.store.get(id).await?)
    }

    /// List functions matching `filter`, ordered by id.
    pub async fn list_functions(&self, filter: &FunctionFilter) -> Result<Vec<FunctionRecord>> {
        Ok(self.store.list(filter).await?)
    }

    // ========== Lifecycle Operations ==========

    /// Apply a lifecycle transition
    pub async fn transition(
        &self,
        id: &FunctionId,
        action: TransitionAction,
        options: TransitionOptions,
    ) -> Result<TransitionOutcome> {
        Ok(self.controller.transition(id, action, options).await?)
    }

    // ========== Risk Operations ==========

    /// Every finding for the current registry snapshot, in a stable order.
    #[instrument(skip(self))]
    pub async fn analyze_risks(&self) -> Result<Vec<RiskFinding>> {
        let snapshot = self.store.snapshot().await?;
        let graph = DependencyGraph::build(&snapshot);
        let findings = self.analyzer.analyze(&snapshot, &graph);
        debug!(records = snapshot.len(), findings = findings.len(), "Risk analysis complete");
        Ok(findings)
    }

    /// Per-function risk classification for the current snapshot.
    pub async fn assess_risks(&self) -> Result<Vec<RiskAssessment>> {
        let snapshot = self.store.snapshot().await?;
        let graph = DependencyGraph::build(&snapshot);
        Ok(self.analyzer.assess(&snapshot, &graph))
    }

    /// Up to `max_batch` sleep candidates, safest first. Nothing is changed.
    #[instrument(skip(self))]
    pub async fn propose_sleep_candidates(&self, max_batch: usize) -> Result<Vec<FunctionId>> {
        let snapshot = self.store.snapshot().await?;
        let graph = DependencyGraph::build(&snapshot);
        Ok(self
            .analyzer
            .propose_sleep_candidates(&snapshot, &graph, max_batch))
    }

    // ========== Wake Operations ==========

    pub async fn wake(&self, id: &FunctionId, reason: WakeReason) -> Result<FunctionRecord> {
        Ok(self.orchestrator.wake(id, reason).await?)
    }

    /// Wake every sleeping function flagged for emergency wake-up.
    pub async fn emergency_wake_all(&self, critical_only: bool) -> Result<WakeReport> {
        Ok(self.orchestrator.emergency_wake_all(critical_only).await?)
    }

    /// Wake the sleeping dependencies of `id`, then `id` itself.
    pub async fn wake_with_dependencies(
        &self,
        id: &FunctionId,
        reason: WakeReason,
    ) -> Result<WakeReport> {
        Ok(self.orchestrator.wake_with_dependencies(id, reason).await?)
    }

    // ========== Monitor Operations ==========

    /// Run a single monitor tick outside the periodic loop.
    pub async fn tick(&self) -> TickReport {
        self.monitor.tick().await
    }

    /// Start the periodic monitor. Must be called within a Tokio runtime.
    pub fn start_monitor(&self) -> Result<()> {
        let mut slot = self.monitor_handle.lock();
        if slot.is_some() {
            return Err(ControlPlaneError::InvalidRequest(
                "monitor loop is already running".to_string(),
            ));
        }
        *slot = Some(self.monitor.clone().spawn());

        let interval_secs = self.monitor.config().interval_secs;
        info!(interval_secs, "Monitor loop requested");
        self.event_aggregator
            .emit_info(SomnusEvent::MonitorStarted { interval_secs });
        Ok(())
    }

    /// Stop the periodic monitor after its current tick. No-op if not running.
    pub async fn stop_monitor(&self) -> Result<()> {
        let handle = self.monitor_handle.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        handle
            .stop()
            .await
            .map_err(|e| ControlPlaneError::Internal(format!("monitor task failed: {e}")))?;
        self.event_aggregator.emit_info(SomnusEvent::MonitorStopped);
        Ok(())
    }

    pub fn is_monitor_running(&self) -> bool {
        self.monitor_handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.monitor.alert_log().alerts()
    }

    pub fn unacknowledged_alerts(&self) -> Vec<Alert> {
        self.monitor.alert_log().unacknowledged()
    }

    pub fn archived_alerts(&self) -> Vec<Alert> {
        self.monitor.alert_log().archived()
    }

    pub fn acknowledge_alert(&self, id: AlertId) -> Result<Alert> {
        Ok(self.monitor.acknowledge_alert(id)?)
    }

    /// Candidates proposed by the most recent monitor tick.
    pub fn last_proposal(&self) -> Vec<FunctionId> {
        self.monitor.last_proposal()
    }

    // ========== Lifecycle ==========

    /// Subscribe to all events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SomnusEventEnvelope> {
        self.event_aggregator.subscribe()
    }

    /// Stop the monitor and close the registry. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        if let Err(e) = self.stop_monitor().await {
            warn!(error = %e, "Monitor did not stop cleanly");
        }
        let closed = self.store.close().await;

        let forwarders = std::mem::take(&mut *self.forwarders.lock());
        for forwarder in &forwarders {
            forwarder.abort();
        }
        for forwarder in forwarders {
            if let Err(e) = forwarder.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Event forwarder failed");
                }
            }
        }

        closed?;
        info!("Control plane closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SomnusControlPlaneBuilder;
    use somnus_monitor::{MetricsSample, StaticMetricsSource};
    use somnus_registry::RegistryError;
    use somnus_types::FunctionStatus;
    use tokio::time::{timeout, Duration};

    fn create_test_control_plane() -> SomnusControlPlane {
        SomnusControlPlaneBuilder::new()
            .with_metrics(Arc::new(StaticMetricsSource::new(MetricsSample::new(
                10.0, 10.0,
            ))))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let cp = create_test_control_plane();
        let stored = cp
            .register_function(FunctionMeta::new("F1", "billing"))
            .await
            .unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, FunctionStatus::Active);

        let loaded = cp.get_function(&FunctionId::new("F1")).await.unwrap();
        assert_eq!(loaded, stored);

        let err = cp.get_function(&FunctionId::new("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let cp = create_test_control_plane();
        cp.register_function(FunctionMeta::new("F1", "a")).await.unwrap();
        let err = cp
            .register_function(FunctionMeta::new("F1", "b"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlPlaneError::Lifecycle(somnus_lifecycle::LifecycleError::Registry(
                RegistryError::AlreadyExists(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_subsystem_events_are_aggregated() {
        let cp = create_test_control_plane();
        let mut rx = cp.subscribe_events();

        cp.register_function(FunctionMeta::new("F1", "a")).await.unwrap();

        let received = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert_eq!(received.source, EventSource::Lifecycle);
        assert!(matches!(
            received.event,
            SomnusEvent::FunctionRegistered { .. }
        ));
    }

    #[tokio::test]
    async fn test_monitor_start_stop() {
        let cp = create_test_control_plane();
        let mut rx = cp.subscribe_events();

        cp.start_monitor().unwrap();
        assert!(cp.is_monitor_running());
        assert!(matches!(
            cp.start_monitor(),
            Err(ControlPlaneError::InvalidRequest(_))
        ));

        cp.stop_monitor().await.unwrap();
        assert!(!cp.is_monitor_running());
        cp.stop_monitor().await.unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert!(matches!(first.event, SomnusEvent::MonitorStarted { interval_secs: 30 }));
    }

    #[tokio::test]
    async fn test_close_rejects_later_writes() {
        let cp = create_test_control_plane();
        cp.register_function(FunctionMeta::new("F1", "a")).await.unwrap();
        cp.close().await.unwrap();
        cp.close().await.unwrap();

        let err = cp
            .transition(
                &FunctionId::new("F1"),
                TransitionAction::Sleep,
                TransitionOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlPlaneError::Lifecycle(somnus_lifecycle::LifecycleError::Registry(
                RegistryError::Closed
            ))
        ));
    }

    #[tokio::test]
    async fn test_close_stops_event_forwarders() {
        let cp = create_test_control_plane();
        let handles: Vec<bool> = cp.forwarders.lock().iter().map(|h| h.is_finished()).collect();
        assert_eq!(handles, vec![false, false, false]);

        let mut rx = cp.subscribe_events();
        cp.register_function(FunctionMeta::new("F1", "a")).await.unwrap();
        let forwarded = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert_eq!(forwarded.source, EventSource::Lifecycle);

        cp.close().await.unwrap();
        assert!(cp.forwarders.lock().is_empty());
    }

    #[test]
    fn test_no_forwarders_without_runtime() {
        let cp = create_test_control_plane();
        assert!(cp.forwarders.lock().is_empty());
    }
}
