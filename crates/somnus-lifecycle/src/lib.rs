//! Somnus Lifecycle - State machine enforcement for registered functions
//!
//! The [`LifecycleController`] is the only component that mutates records
//! after registration. Every transition is:
//!
//! 1. validated against the state machine (`Active`, `Sleeping`, `Disabled`),
//! 2. committed as a single compare-and-swap on the record version, retried
//!    on contention by re-reading and re-validating,
//! 3. followed by the matching [`ComponentRuntime`] pause/resume hook, with a
//!    compensating write if the hook fails or overruns the time budget,
//! 4. appended to the [`AuditSink`] and published as an event.
//!
//! Sleeping a critical function requires an explicit override carrying an
//! audit reason; such transitions are flagged in the audit log.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod audit;
pub mod config;
pub mod controller;
pub mod error;
pub mod runtime;

pub use audit::{AuditEntry, AuditError, AuditOutcome, AuditSink, JsonlAuditSink, MemoryAuditSink};
pub use config::LifecycleConfig;
pub use controller::LifecycleController;
pub use error::{LifecycleError, Result};
pub use runtime::{ComponentRuntime, FailingComponentRuntime, NoOpComponentRuntime, RuntimeError};
