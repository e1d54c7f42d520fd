//! Wake orchestrator

use std::collections::BTreeSet;
use std::sync::Arc;

use somnus_graph::DependencyGraph;
use somnus_lifecycle::{LifecycleController, LifecycleError, Result};
use somnus_types::{
    EventSeverity, EventSource, FunctionFilter, FunctionId, FunctionRecord, FunctionStatus,
    SomnusEvent, SomnusEventEnvelope, WakeReason,
};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::WakeConfig;
use crate::report::{WakeOutcome, WakeReport};

/// Wake orchestrator
pub struct WakeOrchestrator {
    config: WakeConfig,
    controller: Arc<LifecycleController>,
    permits: Arc<Semaphore>,
    event_tx: broadcast::Sender<SomnusEventEnvelope>,
}

impl WakeOrchestrator {
    pub fn new(config: WakeConfig, controller: Arc<LifecycleController>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            config,
            controller,
            permits,
            event_tx,
        }
    }

    /// Subscribe to wake events.
    pub fn subscribe(&self) -> broadcast::Receiver<SomnusEventEnvelope> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    /// Wake a single function.
    pub async fn wake(&self, id: &FunctionId, reason: WakeReason) -> Result<FunctionRecord> {
        self.controller.wake(id, reason).await
    }

    /// Wake every sleeping function flagged for emergency wake-up.
    ///
    /// With `critical_only`, only critical functions are included. Fails only
    /// if the registry cannot be listed; per-id failures are in the report.
    #[instrument(skip(self))]
    pub async fn emergency_wake_all(&self, critical_only: bool) -> Result<WakeReport> {
        let mut filter = FunctionFilter::with_status(FunctionStatus::Sleeping).emergency_wake_up(true);
        if critical_only {
            filter = filter.critical(true);
        }

        let targets: Vec<FunctionId> = self
            .controller
            .store()
            .list(&filter)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        info!(
            targets = targets.len(),
            critical_only,
            concurrency = self.config.concurrency,
            "Emergency wake started"
        );

        let report = self.wake_many(targets, WakeReason::Emergency).await;
        self.finish(&report);
        Ok(report)
    }

    /// Wake the sleeping transitive dependencies of `id`, then `id` itself.
    ///
    /// Dependencies are woken with [`WakeReason::DependencyTrigger`], one
    /// layer at a time with the deepest providers first; each layer waits for
    /// the one before it. Outcomes follow that order. The target is only woken
    /// if it is sleeping; its outcome comes last.
    #[instrument(skip(self), fields(function_id = %id))]
    pub async fn wake_with_dependencies(
        &self,
        id: &FunctionId,
        reason: WakeReason,
    ) -> Result<WakeReport> {
        let snapshot = self.controller.store().snapshot().await?;
        let target = snapshot
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| {
                LifecycleError::Registry(somnus_registry::RegistryError::NotFound(id.clone()))
            })?;
        let target_sleeping = target.is_sleeping();

        let sleeping: BTreeSet<&FunctionId> = snapshot
            .iter()
            .filter(|r| r.is_sleeping())
            .map(|r| &r.id)
            .collect();
        let layers = DependencyGraph::build(&snapshot).dependency_layers(id);

        debug!(
            dependencies = layers.iter().map(Vec::len).sum::<usize>(),
            layers = layers.len(),
            "Waking dependency closure"
        );

        let mut report = WakeReport::default();
        for layer in layers {
            let due: Vec<FunctionId> = layer
                .into_iter()
                .filter(|member| sleeping.contains(member))
                .collect();
            if due.is_empty() {
                continue;
            }
            let woken = self.wake_many(due, WakeReason::DependencyTrigger).await;
            report.outcomes.extend(woken.outcomes);
        }

        if target_sleeping {
            let outcome = match self.controller.wake(id, reason).await {
                Ok(_) => WakeOutcome::success(id.clone()),
                Err(e) => {
                    warn!(function_id = %id, error = %e, "Target wake failed");
                    WakeOutcome::failure(id.clone(), e.to_string())
                }
            };
            report.outcomes.push(outcome);
        }

        self.finish(&report);
        Ok(report)
    }

    /// Wake `ids` concurrently through the bounded pool. Outcomes are sorted by id.
    pub async fn wake_many(&self, ids: Vec<FunctionId>, reason: WakeReason) -> WakeReport {
        let requested: BTreeSet<FunctionId> = ids.into_iter().collect();
        let mut tasks = JoinSet::new();

        for id in requested.iter().cloned() {
            let controller = self.controller.clone();
            let permits = self.permits.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return WakeOutcome::failure(id, "wake pool closed");
                };
                match controller.wake(&id, reason).await {
                    Ok(_) => WakeOutcome::success(id),
                    Err(e) => {
                        warn!(function_id = %id, error = %e, "Wake failed");
                        WakeOutcome::failure(id, e.to_string())
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(requested.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Wake task did not complete"),
            }
        }

        // A task that panicked still gets an outcome.
        let reported: BTreeSet<FunctionId> = outcomes.iter().map(|o| o.id.clone()).collect();
        for id in requested.difference(&reported) {
            outcomes.push(WakeOutcome::failure(id.clone(), "wake task aborted"));
        }

        outcomes.sort_by(|a, b| a.id.cmp(&b.id));
        WakeReport { outcomes }
    }

    fn finish(&self, report: &WakeReport) {
        let woken = report.woken().count();
        let failed = report.failed().count();
        if failed > 0 {
            warn!(requested = report.len(), woken, failed, "Bulk wake finished with failures");
        } else {
            info!(requested = report.len(), woken, "Bulk wake finished");
        }

        let severity = if failed > 0 {
            EventSeverity::Warning
        } else {
            EventSeverity::Info
        };
        let _ = self.event_tx.send(SomnusEventEnvelope::new(
            EventSource::Wake,
            severity,
            SomnusEvent::BulkWakeCompleted {
                requested: report.len(),
                woken,
                failed,
            },
        ));
    }
}
