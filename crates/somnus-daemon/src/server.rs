//! Daemon host: wires the control plane to the registry file and procfs

use std::future::Future;
use std::sync::Arc;

use somnus_control::{SomnusControlPlane, SomnusControlPlaneBuilder};
use somnus_lifecycle::{AuditSink, JsonlAuditSink, MemoryAuditSink};
use somnus_monitor::LogAlertSink;
use somnus_registry::FileRegistryStore;
use tracing::info;

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use crate::proc_metrics::ProcMetricsSource;

/// Somnus daemon
pub struct Server {
    config: DaemonConfig,
    control_plane: SomnusControlPlane,
}

impl Server {
    /// Open the registry and assemble the control plane.
    ///
    /// A corrupt registry aborts startup.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let store = Arc::new(FileRegistryStore::open(&config.registry_path).await?);
        let audit: Arc<dyn AuditSink> = match &config.audit_path {
            Some(path) => Arc::new(JsonlAuditSink::open(path).await?),
            None => Arc::new(MemoryAuditSink::new()),
        };

        let control_plane = SomnusControlPlaneBuilder::new()
            .with_store(store)
            .with_metrics(Arc::new(ProcMetricsSource::new()))
            .with_alert_sink(Arc::new(LogAlertSink))
            .with_audit(audit)
            .with_lifecycle_config(config.lifecycle.clone())
            .with_monitor_config(config.monitor.clone())
            .with_wake_config(config.wake.clone())
            .with_risk_config(config.risk.clone())
            .build()?;

        Ok(Self {
            config,
            control_plane,
        })
    }

    pub fn control_plane(&self) -> &SomnusControlPlane {
        &self.control_plane
    }

    /// Run the monitor until SIGINT or SIGTERM.
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the monitor until `shutdown` resolves, then stop after the
    /// current tick and flush the registry.
    pub async fn run_until<F>(self, shutdown: F) -> DaemonResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            registry = %self.config.registry_path.display(),
            interval_secs = self.config.monitor.interval_secs,
            "Somnus daemon starting"
        );

        self.control_plane.start_monitor()?;
        shutdown.await;

        info!("Somnus daemon shutting down");
        self.control_plane.close().await?;
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use somnus_types::{FunctionId, FunctionMeta, TransitionAction, TransitionOptions};

    fn config_in(dir: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            registry_path: dir.join("registry.json"),
            audit_path: Some(dir.join("audit.jsonl")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_until_flushes_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let server = Server::new(config.clone()).await.unwrap();
        server
            .control_plane()
            .register_function(FunctionMeta::new("F1", "export"))
            .await
            .unwrap();
        server
            .control_plane()
            .transition(
                &FunctionId::new("F1"),
                TransitionAction::Sleep,
                TransitionOptions::default(),
            )
            .await
            .unwrap();
        server.run_until(async {}).await.unwrap();

        let reopened = Server::new(config).await.unwrap();
        let record = reopened
            .control_plane()
            .get_function(&FunctionId::new("F1"))
            .await
            .unwrap();
        assert!(record.is_sleeping());

        let audit = JsonlAuditSink::open(dir.path().join("audit.jsonl"))
            .await
            .unwrap();
        assert_eq!(audit.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_registry_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.registry_path, "{ not json").unwrap();

        assert!(matches!(
            Server::new(config).await,
            Err(crate::error::DaemonError::Registry(
                somnus_registry::RegistryError::CorruptRegistry { .. }
            ))
        ));
    }
}
