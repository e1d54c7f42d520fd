//! Somnus Risk - Deterministic risk analysis over registry snapshots
//!
//! The analyzer is a pure function of a snapshot and its
//! [`DependencyGraph`](somnus_graph::DependencyGraph): no clock, no
//! randomness, no shared state. Two calls against the same snapshot always
//! yield the same findings in the same order.
//!
//! Classification (first match wins, Disabled records are skipped):
//!
//! 1. **CRITICAL**: critical with more than `critical_dependency_limit` dependencies
//! 2. **HIGH**: a direct neighbour (consumer or provider) is critical
//! 3. **MEDIUM**: elevated security level without critical protection
//! 4. **LOW**: everything else
//!
//! Only Active, non-critical LOW and MEDIUM records are sleep candidates.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod analyzer;
pub mod class;

pub use analyzer::{RiskAnalyzer, RiskConfig};
pub use class::{RiskAssessment, RiskClass};
