//! Builder for [`SomnusControlPlane`]

use std::sync::Arc;

use somnus_lifecycle::{AuditSink, ComponentRuntime, LifecycleConfig, MemoryAuditSink, NoOpComponentRuntime};
use somnus_monitor::{AlertSink, LogAlertSink, MetricsSource, MonitorConfig};
use somnus_registry::{InMemoryRegistryStore, RegistryStore};
use somnus_risk::RiskConfig;
use somnus_wake::WakeConfig;

use crate::control_plane::SomnusControlPlane;
use crate::error::{ControlPlaneError, Result};

/// Assembles a control plane from its collaborators.
///
/// Only the metrics source is required. Everything else defaults to an
/// in-memory registry, a no-op component runtime, an in-memory audit log and
/// an alert sink that writes to the log.
#[derive(Default)]
pub struct SomnusControlPlaneBuilder {
    store: Option<Arc<dyn RegistryStore>>,
    metrics: Option<Arc<dyn MetricsSource>>,
    alert_sink: Option<Arc<dyn AlertSink>>,
    runtime: Option<Arc<dyn ComponentRuntime>>,
    audit: Option<Arc<dyn AuditSink>>,
    lifecycle_config: LifecycleConfig,
    monitor_config: MonitorConfig,
    wake_config: WakeConfig,
    risk_config: RiskConfig,
}

impl SomnusControlPlaneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn ComponentRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_lifecycle_config(mut self, config: LifecycleConfig) -> Self {
        self.lifecycle_config = config;
        self
    }

    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn with_wake_config(mut self, config: WakeConfig) -> Self {
        self.wake_config = config;
        self
    }

    pub fn with_risk_config(mut self, config: RiskConfig) -> Self {
        self.risk_config = config;
        self
    }

    /// Build the control plane.
    ///
    /// Event forwarding from the subsystems starts only when called inside a
    /// Tokio runtime.
    pub fn build(self) -> Result<SomnusControlPlane> {
        let metrics = self
            .metrics
            .ok_or(ControlPlaneError::NotInitialized("metrics source"))?;

        if self.lifecycle_config.transition_timeout_ms == 0 {
            return Err(ControlPlaneError::InvalidRequest(
                "transition_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.monitor_config.interval_secs == 0 {
            return Err(ControlPlaneError::InvalidRequest(
                "monitor interval_secs must be greater than zero".to_string(),
            ));
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRegistryStore::new()));
        let alert_sink = self.alert_sink.unwrap_or_else(|| Arc::new(LogAlertSink));
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(NoOpComponentRuntime));
        let audit = self
            .audit
            .unwrap_or_else(|| Arc::new(MemoryAuditSink::new()));

        Ok(SomnusControlPlane::new(
            store,
            metrics,
            alert_sink,
            runtime,
            audit,
            self.lifecycle_config,
            self.monitor_config,
            self.wake_config,
            self.risk_config,
        ))
    }
}
