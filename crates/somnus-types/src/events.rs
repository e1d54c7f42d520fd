//! Event types for Somnus observability
//!
//! Events provide a unified stream of lifecycle and monitoring activity.

use crate::{Alert, AlertType, FunctionId, FunctionStatus, TransitionAction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all Somnus events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SomnusEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Event source
    pub source: EventSource,

    /// Event severity
    pub severity: EventSeverity,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Actor who triggered the event
    pub actor: Option<String>,

    /// The actual event
    pub event: SomnusEvent,
}

impl SomnusEventEnvelope {
    pub fn new(source: EventSource, severity: EventSeverity, event: SomnusEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source,
            severity,
            correlation_id: None,
            actor: None,
            event,
        }
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}

/// Event sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Registry store
    Registry,
    /// Lifecycle controller
    Lifecycle,
    /// Monitor loop
    Monitor,
    /// Wake orchestrator
    Wake,
    /// Control plane
    ControlPlane,
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Somnus events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SomnusEvent {
    // ═══════════════════════════════════════════════════════════════════
    // LIFECYCLE EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// Function registered
    FunctionRegistered { function_id: FunctionId },

    /// Transition committed to the registry
    TransitionCommitted {
        function_id: FunctionId,
        action: TransitionAction,
        from: FunctionStatus,
        to: FunctionStatus,
        version: u64,
    },

    /// A critical function was put to sleep through the audited override path
    ProtectionOverridden {
        function_id: FunctionId,
        reason: String,
    },

    /// Transition rolled back after the component runtime refused it
    TransitionCompensated {
        function_id: FunctionId,
        action: TransitionAction,
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // MONITOR EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// Alert raised
    AlertRaised { alert: Alert },

    /// Alert dropped because the sink queue was full or closed
    AlertDropped { alert_type: AlertType, reason: String },

    /// Sleep candidates proposed for operator review
    SleepCandidatesProposed { candidates: Vec<FunctionId> },

    /// Monitor tick completed
    MonitorTick {
        cpu_percent: Option<f64>,
        memory_percent: Option<f64>,
        sleeping: usize,
        critical_sleeping: usize,
    },

    /// Periodic monitor started by the control plane
    MonitorStarted { interval_secs: u64 },

    /// Periodic monitor stopped after finishing its current tick
    MonitorStopped,

    // ═══════════════════════════════════════════════════════════════════
    // WAKE EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// Bulk wake finished
    BulkWakeCompleted {
        requested: usize,
        woken: usize,
        failed: usize,
    },
}
