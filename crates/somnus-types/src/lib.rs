//! Somnus Types - Core types for the function lifecycle registry
//!
//! Somnus keeps a registry of independently registered system components
//! ("functions") and decides which of them may be put to sleep to save
//! resources, while protecting the ones flagged as critical.
//!
//! ## Architectural Boundaries
//!
//! - **Somnus** owns: lifecycle status, sleep safety policy, alerts, proposals
//! - **Component runtime** owns: what a function actually does when paused or resumed
//! - **Operators** own: acting on sleep proposals and acknowledging alerts
//!
//! ## Key Concepts
//!
//! - **FunctionRecord**: Registry entry with status, criticality and dependencies
//! - **RiskFinding**: Derived classification, recomputed from every snapshot
//! - **Alert**: Append-only log entry raised by the monitor loop
//! - **TransitionAction**: Sleep, wake, disable and enable requests
//! - **Events**: Unified observability stream

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod alert;
pub mod events;
pub mod ids;
pub mod record;
pub mod risk;
pub mod transition;

// Re-export main types
pub use alert::{Alert, AlertSeverity, AlertType};
pub use events::{EventSeverity, EventSource, SomnusEvent, SomnusEventEnvelope};
pub use ids::{AlertId, FunctionId};
pub use record::{
    FunctionFilter, FunctionMeta, FunctionRecord, FunctionStatus, SecurityLevel, SleepSnapshot,
    ValidationError,
};
pub use risk::{RiskFinding, RiskFindingType, RiskSeverity};
pub use transition::{TransitionAction, TransitionOptions, TransitionOutcome, WakeReason};
