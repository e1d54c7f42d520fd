//! Somnus Wake - Bulk and targeted wake-ups
//!
//! The [`WakeOrchestrator`] wakes sleeping functions through the lifecycle
//! controller using a bounded pool, so a large emergency cannot spike load.
//! Bulk calls never fail atomically: every requested id gets its own
//! [`WakeOutcome`], and one failure never blocks or rolls back another wake.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod orchestrator;
pub mod report;

pub use config::WakeConfig;
pub use orchestrator::WakeOrchestrator;
pub use report::{WakeOutcome, WakeReport};
