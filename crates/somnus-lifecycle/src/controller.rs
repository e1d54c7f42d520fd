//! Lifecycle controller
//!
//! Enforces the state machine and performs every post-registration write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use somnus_graph::DependencyGraph;
use somnus_registry::{RegistryError, RegistryStore};
use somnus_types::{
    EventSeverity, EventSource, FunctionId, FunctionMeta, FunctionRecord, FunctionStatus,
    RiskFinding, RiskFindingType, RiskSeverity, SleepSnapshot, SomnusEvent, SomnusEventEnvelope,
    TransitionAction, TransitionOptions, TransitionOutcome, WakeReason,
};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditOutcome, AuditSink};
use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, Result};
use crate::runtime::ComponentRuntime;

/// Lifecycle controller
pub struct LifecycleController {
    config: LifecycleConfig,
    store: Arc<dyn RegistryStore>,
    runtime: Arc<dyn ComponentRuntime>,
    audit: Arc<dyn AuditSink>,
    event_tx: broadcast::Sender<SomnusEventEnvelope>,
    /// One gate per function; held from read through hook and compensation.
    gates: DashMap<FunctionId, Arc<Mutex<()>>>,
}

/// Grace for re-reading a record after its write ran out of budget.
const RECHECK_GRACE: Duration = Duration::from_millis(250);

/// A validated transition, ready to commit
struct Plan {
    next: FunctionRecord,
    override_applied: bool,
}

/// Why a committed transition has to be reverted
enum HookFailure {
    Runtime(String),
    Timeout,
}

impl LifecycleController {
    pub fn new(
        config: LifecycleConfig,
        store: Arc<dyn RegistryStore>,
        runtime: Arc<dyn ComponentRuntime>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            config,
            store,
            runtime,
            audit,
            event_tx,
            gates: DashMap::new(),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SomnusEventEnvelope> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    /// Register a new function. Records start Active at version 1.
    #[instrument(skip(self, meta), fields(function_id = %meta.id))]
    pub async fn register(&self, meta: FunctionMeta) -> Result<FunctionRecord> {
        meta.validate()?;
        let record = FunctionRecord::from_meta(meta, Utc::now());
        let stored = self.store.insert(record).await?;

        info!(
            function_id = %stored.id,
            critical = stored.is_critical,
            dependencies = stored.depends_on.len(),
            "Function registered"
        );
        self.emit(
            EventSeverity::Info,
            None,
            SomnusEvent::FunctionRegistered {
                function_id: stored.id.clone(),
            },
        );

        Ok(stored)
    }

    /// Wake a sleeping function.
    pub async fn wake(&self, id: &FunctionId, reason: WakeReason) -> Result<FunctionRecord> {
        self.transition(id, TransitionAction::wake(reason), TransitionOptions::default())
            .await
            .map(|outcome| outcome.record)
    }

    /// Apply a lifecycle transition.
    ///
    /// Transitions on the same id run one at a time, from the first read to
    /// the end of the runtime hook or its compensation. Different ids do not
    /// wait on each other. The time budget covers waiting for the gate, the
    /// registry write and the hook.
    #[instrument(skip(self, options), fields(function_id = %id, action = %action))]
    pub async fn transition(
        &self,
        id: &FunctionId,
        action: TransitionAction,
        options: TransitionOptions,
    ) -> Result<TransitionOutcome> {
        options.validate()?;
        let deadline = Instant::now() + self.config.transition_timeout();

        let gate = self.gate(id);
        let _guard = timeout_at(deadline, gate.lock_owned())
            .await
            .map_err(|_| self.timeout_error(id))?;

        let (previous, committed, override_applied, attempts) =
            self.commit(id, action, &options, deadline).await?;

        if override_applied {
            warn!(
                function_id = %id,
                reason = options.audit_reason.as_deref().unwrap_or_default(),
                actor = options.actor.as_deref().unwrap_or("unknown"),
                "Critical function put to sleep through protection override"
            );
        }

        if let Some(failure) = self.run_hook(id, action, deadline).await {
            return Err(self
                .revert(&previous, committed, action, &options, override_applied, failure)
                .await);
        }

        info!(
            function_id = %id,
            from = %previous.status,
            to = %committed.status,
            version = committed.version,
            attempts,
            "Transition committed"
        );

        self.record_audit(
            &previous,
            &committed,
            action,
            &options,
            override_applied,
            AuditOutcome::Committed,
        )
        .await;
        self.emit_committed(&previous, &committed, action, &options, override_applied);

        let warnings = match action {
            TransitionAction::Disable => self.active_dependents(id).await,
            _ => Vec::new(),
        };

        Ok(TransitionOutcome {
            record: committed,
            warnings,
            attempts,
            override_applied,
        })
    }

    /// Read, validate and compare-and-swap, retrying lost races.
    async fn commit(
        &self,
        id: &FunctionId,
        action: TransitionAction,
        options: &TransitionOptions,
        deadline: Instant,
    ) -> Result<(FunctionRecord, FunctionRecord, bool, u32)> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let current = timeout_at(deadline, self.store.get(id))
                .await
                .map_err(|_| self.timeout_error(id))??;
            let plan = plan(&current, action, options, Utc::now())?;

            if Instant::now() >= deadline {
                return Err(self.timeout_error(id));
            }

            let target = plan.next.status;
            let write = match timeout_at(deadline, self.store.upsert(plan.next, current.version))
                .await
            {
                Ok(write) => write,
                Err(_) => {
                    let stored = self.recheck(&current, target).await?;
                    return Ok((current, stored, plan.override_applied, attempts));
                }
            };

            match write {
                Ok(stored) => return Ok((current, stored, plan.override_applied, attempts)),
                Err(RegistryError::ConcurrentModification { actual, .. })
                    if attempts <= self.config.max_cas_retries =>
                {
                    debug!(
                        function_id = %id,
                        attempt = attempts,
                        expected = current.version,
                        actual,
                        "Lost compare-and-swap, re-reading"
                    );
                }
                Err(RegistryError::ConcurrentModification { .. }) => {
                    warn!(function_id = %id, attempts, "Giving up after repeated contention");
                    return Err(LifecycleError::ConcurrentModification {
                        id: id.clone(),
                        attempts,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Find out whether a write that ran out of budget landed anyway.
    async fn recheck(
        &self,
        current: &FunctionRecord,
        target: FunctionStatus,
    ) -> Result<FunctionRecord> {
        match timeout(RECHECK_GRACE, self.store.get(&current.id)).await {
            Ok(Ok(after)) if after.version == current.version + 1 && after.status == target => {
                warn!(
                    function_id = %current.id,
                    version = after.version,
                    "Registry write finished past the transition budget"
                );
                Ok(after)
            }
            _ => Err(self.timeout_error(&current.id)),
        }
    }

    fn gate(&self, id: &FunctionId) -> Arc<Mutex<()>> {
        self.gates.entry(id.clone()).or_default().clone()
    }

    async fn run_hook(
        &self,
        id: &FunctionId,
        action: TransitionAction,
        deadline: Instant,
    ) -> Option<HookFailure> {
        let hook = match action {
            TransitionAction::Sleep => self.runtime.pause(id),
            TransitionAction::Wake { .. } => self.runtime.resume(id),
            TransitionAction::Disable | TransitionAction::Enable => return None,
        };

        match timeout_at(deadline, hook).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(HookFailure::Runtime(e.reason)),
            Err(_) => Some(HookFailure::Timeout),
        }
    }

    /// Undo a commit whose runtime hook failed and build the error to surface.
    async fn revert(
        &self,
        previous: &FunctionRecord,
        committed: FunctionRecord,
        action: TransitionAction,
        options: &TransitionOptions,
        override_applied: bool,
        failure: HookFailure,
    ) -> LifecycleError {
        let id = previous.id.clone();
        let (reason, err) = match failure {
            HookFailure::Runtime(reason) => (
                reason.clone(),
                LifecycleError::Runtime {
                    id: id.clone(),
                    action,
                    reason,
                },
            ),
            HookFailure::Timeout => (
                format!(
                    "{} hook exceeded {}ms budget",
                    action.name(),
                    self.config.transition_timeout_ms
                ),
                self.timeout_error(&id),
            ),
        };

        warn!(function_id = %id, action = %action, reason = %reason, "Component runtime hook failed");

        if !self.config.compensate_on_runtime_failure {
            self.record_audit(
                previous,
                &committed,
                action,
                options,
                override_applied,
                AuditOutcome::Committed,
            )
            .await;
            self.emit_committed(previous, &committed, action, options, override_applied);
            return err;
        }

        let mut restored = previous.clone();
        restored.last_transition_at = Utc::now();
        match self.store.upsert(restored, committed.version).await {
            Ok(restored) => {
                info!(
                    function_id = %id,
                    status = %restored.status,
                    version = restored.version,
                    "Transition compensated"
                );
                self.record_audit(
                    previous,
                    &committed,
                    action,
                    options,
                    override_applied,
                    AuditOutcome::Compensated {
                        reason: reason.clone(),
                    },
                )
                .await;
                self.emit(
                    EventSeverity::Warning,
                    options.actor.clone(),
                    SomnusEvent::TransitionCompensated {
                        function_id: id,
                        action,
                        reason,
                    },
                );
            }
            Err(e) => {
                error!(
                    function_id = %id,
                    error = %e,
                    "Compensating write failed; committed state stands"
                );
                self.record_audit(
                    previous,
                    &committed,
                    action,
                    options,
                    override_applied,
                    AuditOutcome::Committed,
                )
                .await;
                self.emit_committed(previous, &committed, action, options, override_applied);
            }
        }

        err
    }

    /// Active functions that depend on `id`, as warnings.
    async fn active_dependents(&self, id: &FunctionId) -> Vec<RiskFinding> {
        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(function_id = %id, error = %e, "Could not check dependents after disable");
                return Vec::new();
            }
        };
        let graph = DependencyGraph::build(&snapshot);

        let active: Vec<&FunctionId> = snapshot
            .iter()
            .filter(|r| r.is_active() && graph.reverse_deps(id).contains(&r.id))
            .map(|r| &r.id)
            .collect();
        if active.is_empty() {
            return Vec::new();
        }

        let names = active
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        warn!(function_id = %id, dependents = %names, "Disabled function has active dependents");

        vec![RiskFinding::new(
            RiskFindingType::ActiveDependents,
            RiskSeverity::Medium,
            id.clone(),
            format!("{} active functions depend on {}: {}", active.len(), id, names),
            "Disable or re-point the dependents, or re-enable this function",
        )]
    }

    async fn record_audit(
        &self,
        previous: &FunctionRecord,
        committed: &FunctionRecord,
        action: TransitionAction,
        options: &TransitionOptions,
        override_applied: bool,
        outcome: AuditOutcome,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            function_id: committed.id.clone(),
            action,
            from: previous.status,
            to: committed.status,
            version: committed.version,
            actor: options.actor.clone(),
            reason: options.audit_reason.clone(),
            override_applied,
            outcome,
        };
        if let Err(e) = self.audit.write(entry).await {
            error!(function_id = %committed.id, error = %e, "Failed to write audit entry");
        }
    }

    fn emit_committed(
        &self,
        previous: &FunctionRecord,
        committed: &FunctionRecord,
        action: TransitionAction,
        options: &TransitionOptions,
        override_applied: bool,
    ) {
        if override_applied {
            self.emit(
                EventSeverity::Warning,
                options.actor.clone(),
                SomnusEvent::ProtectionOverridden {
                    function_id: committed.id.clone(),
                    reason: options.audit_reason.clone().unwrap_or_default(),
                },
            );
        }
        self.emit(
            EventSeverity::Info,
            options.actor.clone(),
            SomnusEvent::TransitionCommitted {
                function_id: committed.id.clone(),
                action,
                from: previous.status,
                to: committed.status,
                version: committed.version,
            },
        );
    }

    fn emit(&self, severity: EventSeverity, actor: Option<String>, event: SomnusEvent) {
        let envelope =
            SomnusEventEnvelope::new(EventSource::Lifecycle, severity, event).with_actor(actor);
        // No subscribers is fine
        let _ = self.event_tx.send(envelope);
    }

    fn timeout_error(&self, id: &FunctionId) -> LifecycleError {
        LifecycleError::TransitionTimeout {
            id: id.clone(),
            budget_ms: self.config.transition_timeout_ms,
        }
    }
}

/// Validate `action` against `current` and build the next record.
fn plan(
    current: &FunctionRecord,
    action: TransitionAction,
    options: &TransitionOptions,
    now: DateTime<Utc>,
) -> Result<Plan> {
    if current.status != action.required_status() {
        return Err(LifecycleError::InvalidTransition {
            id: current.id.clone(),
            from: current.status,
            action,
        });
    }

    let mut next = current.clone();
    next.last_transition_at = now;
    let mut override_applied = false;

    match action {
        TransitionAction::Sleep => {
            if current.is_critical {
                if !options.override_protection {
                    return Err(LifecycleError::ProtectedTransition(current.id.clone()));
                }
                override_applied = true;
            }
            next.status = FunctionStatus::Sleeping;
            next.sleep_snapshot = Some(SleepSnapshot {
                previous_status: current.status,
                slept_at: now,
            });
        }
        TransitionAction::Wake { .. } => {
            next.status = current
                .sleep_snapshot
                .as_ref()
                .map(|s| s.previous_status)
                .unwrap_or(FunctionStatus::Active);
            next.sleep_snapshot = None;
        }
        TransitionAction::Disable => next.status = FunctionStatus::Disabled,
        TransitionAction::Enable => next.status = FunctionStatus::Active,
    }

    Ok(Plan {
        next,
        override_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::runtime::{FailingComponentRuntime, NoOpComponentRuntime, RuntimeError};
    use async_trait::async_trait;
    use somnus_registry::InMemoryRegistryStore;
    use somnus_types::FunctionFilter;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        controller: LifecycleController,
        store: Arc<InMemoryRegistryStore>,
        audit: Arc<MemoryAuditSink>,
    }

    fn harness_with(runtime: Arc<dyn ComponentRuntime>, config: LifecycleConfig) -> Harness {
        let store = Arc::new(InMemoryRegistryStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let controller = LifecycleController::new(config, store.clone(), runtime, audit.clone());
        Harness {
            controller,
            store,
            audit,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(NoOpComponentRuntime), LifecycleConfig::default())
    }

    async fn register(h: &Harness, meta: FunctionMeta) -> FunctionRecord {
        h.controller.register(meta).await.unwrap()
    }

    #[tokio::test]
    async fn test_register_starts_active() {
        let h = harness();
        let mut events = h.controller.subscribe();
        let record = register(&h, FunctionMeta::new("F1", "ledger")).await;

        assert_eq!(record.status, FunctionStatus::Active);
        assert_eq!(record.version, 1);
        assert!(matches!(
            events.try_recv().unwrap().event,
            SomnusEvent::FunctionRegistered { .. }
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_empty_id() {
        let h = harness();
        let err = h
            .controller
            .register(FunctionMeta::new("", "nameless"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sleep_then_wake_round_trip() {
        let h = harness();
        register(&h, FunctionMeta::new("F1", "digest")).await;
        let id = FunctionId::new("F1");

        let slept = h
            .controller
            .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap();
        assert_eq!(slept.record.status, FunctionStatus::Sleeping);
        assert_eq!(slept.record.version, 2);
        assert_eq!(
            slept.record.sleep_snapshot.as_ref().unwrap().previous_status,
            FunctionStatus::Active
        );

        let woken = h.controller.wake(&id, WakeReason::Manual).await.unwrap();
        assert_eq!(woken.status, FunctionStatus::Active);
        assert!(woken.sleep_snapshot.is_none());
        assert_eq!(woken.version, 3);
        assert_eq!(h.audit.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_critical_sleep_protected_without_write() {
        let h = harness();
        register(&h, FunctionMeta::new("F1", "ledger").critical(true)).await;
        let id = FunctionId::new("F1");

        let err = h
            .controller
            .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ProtectedTransition(_)));

        let record = h.store.get(&id).await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.status, FunctionStatus::Active);
        assert!(h.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn test_override_requires_reason() {
        let h = harness();
        register(&h, FunctionMeta::new("F1", "ledger").critical(true)).await;

        let options = TransitionOptions {
            override_protection: true,
            audit_reason: Some("   ".to_string()),
            actor: None,
        };
        let err = h
            .controller
            .transition(&"F1".into(), TransitionAction::Sleep, options)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_override_is_audited() {
        let h = harness();
        let mut events = h.controller.subscribe();
        register(&h, FunctionMeta::new("F1", "ledger").critical(true)).await;
        let _ = events.try_recv();

        let outcome = h
            .controller
            .transition(
                &"F1".into(),
                TransitionAction::Sleep,
                TransitionOptions::overridden("datacenter migration").with_actor("ops"),
            )
            .await
            .unwrap();
        assert!(outcome.override_applied);
        assert_eq!(outcome.record.status, FunctionStatus::Sleeping);

        let overrides = h.audit.overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].reason.as_deref(), Some("datacenter migration"));
        assert_eq!(overrides[0].actor.as_deref(), Some("ops"));

        let first = events.try_recv().unwrap();
        assert_eq!(first.severity, EventSeverity::Warning);
        assert!(matches!(first.event, SomnusEvent::ProtectionOverridden { .. }));
    }

    #[tokio::test]
    async fn test_sleeping_cannot_be_disabled() {
        let h = harness();
        register(&h, FunctionMeta::new("F1", "digest")).await;
        let id = FunctionId::new("F1");
        h.controller
            .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap();

        let err = h
            .controller
            .transition(&id, TransitionAction::Disable, TransitionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: FunctionStatus::Sleeping,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_disabled_cannot_sleep() {
        let h = harness();
        register(&h, FunctionMeta::new("F1", "digest")).await;
        let id = FunctionId::new("F1");
        h.controller
            .transition(&id, TransitionAction::Disable, TransitionOptions::default())
            .await
            .unwrap();

        let err = h
            .controller
            .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        let enabled = h
            .controller
            .transition(&id, TransitionAction::Enable, TransitionOptions::default())
            .await
            .unwrap();
        assert_eq!(enabled.record.status, FunctionStatus::Active);
    }

    #[tokio::test]
    async fn test_disable_warns_about_active_dependents() {
        let h = harness();
        register(&h, FunctionMeta::new("db", "database")).await;
        register(&h, FunctionMeta::new("api", "api").depends_on(["db"])).await;
        register(&h, FunctionMeta::new("cron", "cron").depends_on(["db"])).await;
        h.controller
            .transition(&"cron".into(), TransitionAction::Disable, TransitionOptions::default())
            .await
            .unwrap();

        let outcome = h
            .controller
            .transition(&"db".into(), TransitionAction::Disable, TransitionOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.record.status, FunctionStatus::Disabled);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].finding_type, RiskFindingType::ActiveDependents);
        assert!(outcome.warnings[0].description.contains("api"));
        assert!(!outcome.warnings[0].description.contains("cron"));
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let h = harness();
        let err = h
            .controller
            .wake(&"missing".into(), WakeReason::Manual)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_runtime_failure_compensates() {
        let h = harness_with(
            Arc::new(FailingComponentRuntime::new().fail_pause("F1")),
            LifecycleConfig::default(),
        );
        register(&h, FunctionMeta::new("F1", "digest")).await;
        let id = FunctionId::new("F1");

        let err = h
            .controller
            .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Runtime { .. }));

        let record = h.store.get(&id).await.unwrap();
        assert_eq!(record.status, FunctionStatus::Active);
        assert!(record.sleep_snapshot.is_none());
        // Commit plus compensation
        assert_eq!(record.version, 3);

        let entries = h.audit.entries();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].outcome, AuditOutcome::Compensated { .. }));
    }

    struct SlowRuntime;

    #[async_trait]
    impl ComponentRuntime for SlowRuntime {
        async fn pause(&self, _id: &FunctionId) -> std::result::Result<(), RuntimeError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn resume(&self, _id: &FunctionId) -> std::result::Result<(), RuntimeError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_hook_times_out_without_partial_state() {
        let h = harness_with(Arc::new(SlowRuntime), LifecycleConfig::default());
        register(&h, FunctionMeta::new("F1", "digest")).await;
        let id = FunctionId::new("F1");

        let err = h
            .controller
            .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::TransitionTimeout { budget_ms: 5_000, .. }
        ));

        let record = h.store.get(&id).await.unwrap();
        assert_eq!(record.status, FunctionStatus::Active);
        assert!(record.check_invariants().is_ok());
    }

    /// Store that lets a competing writer win the first `contended` upserts.
    struct ContendedStore {
        inner: InMemoryRegistryStore,
        contended: AtomicU32,
    }

    #[async_trait]
    impl RegistryStore for ContendedStore {
        async fn get(&self, id: &FunctionId) -> somnus_registry::Result<FunctionRecord> {
            self.inner.get(id).await
        }

        async fn list(
            &self,
            filter: &FunctionFilter,
        ) -> somnus_registry::Result<Vec<FunctionRecord>> {
            self.inner.list(filter).await
        }

        async fn upsert(
            &self,
            record: FunctionRecord,
            expected_version: u64,
        ) -> somnus_registry::Result<FunctionRecord> {
            if expected_version > 0 && self.contended.load(Ordering::SeqCst) > 0 {
                self.contended.fetch_sub(1, Ordering::SeqCst);
                let mut rival = self.inner.get(&record.id).await?;
                let version = rival.version;
                rival
                    .extensions
                    .insert("touched".to_string(), serde_json::json!(version));
                self.inner.upsert(rival, version).await?;
            }
            self.inner.upsert(record, expected_version).await
        }

        async fn count(&self) -> somnus_registry::Result<usize> {
            self.inner.count().await
        }

        async fn close(&self) -> somnus_registry::Result<()> {
            self.inner.close().await
        }
    }

    fn contended_controller(contended: u32) -> (LifecycleController, Arc<ContendedStore>) {
        let store = Arc::new(ContendedStore {
            inner: InMemoryRegistryStore::new(),
            contended: AtomicU32::new(contended),
        });
        let controller = LifecycleController::new(
            LifecycleConfig::default(),
            store.clone(),
            Arc::new(NoOpComponentRuntime),
            Arc::new(MemoryAuditSink::new()),
        );
        (controller, store)
    }

    #[tokio::test]
    async fn test_lost_race_retried_against_new_version() {
        let (controller, _store) = contended_controller(1);
        controller
            .register(FunctionMeta::new("F1", "digest"))
            .await
            .unwrap();

        let outcome = controller
            .transition(&"F1".into(), TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
        // 1 registered, 2 rival write, 3 sleep
        assert_eq!(outcome.record.version, 3);
        assert!(outcome.record.extensions.contains_key("touched"));
    }

    #[tokio::test]
    async fn test_persistent_contention_surfaces() {
        let (controller, _store) = contended_controller(u32::MAX);
        controller
            .register(FunctionMeta::new("F1", "digest"))
            .await
            .unwrap();

        let err = controller
            .transition(&"F1".into(), TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::ConcurrentModification { attempts: 4, .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_transitions_single_winner() {
        let h = Arc::new(harness());
        register(&h, FunctionMeta::new("F1", "digest")).await;
        let id = FunctionId::new("F1");

        let (a, b) = tokio::join!(
            {
                let h = h.clone();
                let id = id.clone();
                async move {
                    h.controller
                        .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
                        .await
                }
            },
            {
                let h = h.clone();
                let id = id.clone();
                async move {
                    h.controller
                        .transition(&id, TransitionAction::Disable, TransitionOptions::default())
                        .await
                }
            }
        );

        assert!(a.is_ok() ^ b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser.unwrap_err(),
            LifecycleError::InvalidTransition { .. }
        ));
        assert_eq!(h.store.get(&id).await.unwrap().version, 2);
    }

    /// Runtime whose pause takes a while, recording hook order.
    #[derive(Default)]
    struct SlowPauseRuntime {
        calls: parking_lot::Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ComponentRuntime for SlowPauseRuntime {
        async fn pause(&self, _id: &FunctionId) -> std::result::Result<(), RuntimeError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.calls.lock().push("pause");
            Ok(())
        }

        async fn resume(&self, _id: &FunctionId) -> std::result::Result<(), RuntimeError> {
            self.calls.lock().push("resume");
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_waits_for_inflight_pause() {
        let runtime = Arc::new(SlowPauseRuntime::default());
        let store = Arc::new(InMemoryRegistryStore::new());
        let controller = Arc::new(LifecycleController::new(
            LifecycleConfig::default(),
            store.clone(),
            runtime.clone(),
            Arc::new(MemoryAuditSink::new()),
        ));
        controller
            .register(FunctionMeta::new("F1", "digest"))
            .await
            .unwrap();
        let id = FunctionId::new("F1");

        let sleeper = {
            let controller = controller.clone();
            let id = id.clone();
            tokio::spawn(async move {
                controller
                    .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let woken = controller.wake(&id, WakeReason::Manual).await.unwrap();
        let slept = sleeper.await.unwrap().unwrap();

        assert_eq!(slept.record.status, FunctionStatus::Sleeping);
        assert_eq!(woken.status, FunctionStatus::Active);
        assert_eq!(*runtime.calls.lock(), vec!["pause", "resume"]);

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.status, FunctionStatus::Active);
        assert_eq!(record.version, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pause_does_not_hold_other_ids() {
        let runtime = Arc::new(SlowPauseRuntime::default());
        let store = Arc::new(InMemoryRegistryStore::new());
        let controller = Arc::new(LifecycleController::new(
            LifecycleConfig::default(),
            store,
            runtime,
            Arc::new(MemoryAuditSink::new()),
        ));
        controller
            .register(FunctionMeta::new("F1", "digest"))
            .await
            .unwrap();
        controller
            .register(FunctionMeta::new("F2", "report"))
            .await
            .unwrap();

        let sleeper = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .transition(&"F1".into(), TransitionAction::Sleep, TransitionOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        controller
            .transition(&"F2".into(), TransitionAction::Disable, TransitionOptions::default())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(sleeper.await.unwrap().is_ok());
    }

    /// Store whose updates never finish inside the budget.
    struct StalledStore {
        inner: InMemoryRegistryStore,
    }

    #[async_trait]
    impl RegistryStore for StalledStore {
        async fn get(&self, id: &FunctionId) -> somnus_registry::Result<FunctionRecord> {
            self.inner.get(id).await
        }

        async fn list(
            &self,
            filter: &FunctionFilter,
        ) -> somnus_registry::Result<Vec<FunctionRecord>> {
            self.inner.list(filter).await
        }

        async fn upsert(
            &self,
            record: FunctionRecord,
            expected_version: u64,
        ) -> somnus_registry::Result<FunctionRecord> {
            if expected_version > 0 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.upsert(record, expected_version).await
        }

        async fn count(&self) -> somnus_registry::Result<usize> {
            self.inner.count().await
        }

        async fn close(&self) -> somnus_registry::Result<()> {
            self.inner.close().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_registry_write_times_out() {
        let store = Arc::new(StalledStore {
            inner: InMemoryRegistryStore::new(),
        });
        let audit = Arc::new(MemoryAuditSink::new());
        let controller = LifecycleController::new(
            LifecycleConfig::default(),
            store.clone(),
            Arc::new(NoOpComponentRuntime),
            audit.clone(),
        );
        controller
            .register(FunctionMeta::new("F1", "digest"))
            .await
            .unwrap();

        let started = Instant::now();
        let err = controller
            .transition(&"F1".into(), TransitionAction::Sleep, TransitionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::TransitionTimeout { budget_ms: 5_000, .. }
        ));
        assert!(started.elapsed() < Duration::from_secs(6));

        let record = store.get(&"F1".into()).await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.status, FunctionStatus::Active);
        assert!(audit.entries().is_empty());
    }
}
