//! Risk finding types
//!
//! Findings are derived from a registry snapshot and never persisted as a
//! source of truth; they are recomputed on every analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FunctionId;

/// Severity of a risk finding. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskSeverity::Low => "LOW",
            RiskSeverity::Medium => "MEDIUM",
            RiskSeverity::High => "HIGH",
            RiskSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of risk finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFindingType {
    /// Critical function with many dependencies
    CriticalDependencyLoad,
    /// A critical function depends on this one
    CriticalConsumer,
    /// This function depends on a critical function
    CriticalProvider,
    /// High security exposure without critical protection
    SecurityMisclassification,
    /// Critical function with no elevated risk; still never eligible for sleep
    CriticalProtected,
    /// Safe to suspend
    SleepEligible,
    /// Dependency cycle detected in the graph
    DependencyCycle,
    /// Dependency on an id absent from the registry
    DanglingDependency,
    /// Critical function currently sleeping
    CriticalSleeping,
    /// Disabled function still has active dependents
    ActiveDependents,
}

impl RiskFindingType {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskFindingType::CriticalDependencyLoad => "critical_dependency_load",
            RiskFindingType::CriticalConsumer => "critical_consumer",
            RiskFindingType::CriticalProvider => "critical_provider",
            RiskFindingType::SecurityMisclassification => "security_misclassification",
            RiskFindingType::CriticalProtected => "critical_protected",
            RiskFindingType::SleepEligible => "sleep_eligible",
            RiskFindingType::DependencyCycle => "dependency_cycle",
            RiskFindingType::DanglingDependency => "dangling_dependency",
            RiskFindingType::CriticalSleeping => "critical_sleeping",
            RiskFindingType::ActiveDependents => "active_dependents",
        }
    }
}

impl fmt::Display for RiskFindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single derived risk finding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskFinding {
    #[serde(rename = "type")]
    pub finding_type: RiskFindingType,
    pub severity: RiskSeverity,
    pub function_id: FunctionId,
    pub description: String,
    pub recommendation: String,
}

impl RiskFinding {
    pub fn new(
        finding_type: RiskFindingType,
        severity: RiskSeverity,
        function_id: FunctionId,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            finding_type,
            severity,
            function_id,
            description: description.into(),
            recommendation: recommendation.into(),
        }
    }

    /// Sort findings by severity (most severe first), then function id, then type.
    pub fn sort(findings: &mut [RiskFinding]) {
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.function_id.cmp(&b.function_id))
                .then_with(|| a.finding_type.cmp(&b.finding_type))
                .then_with(|| a.description.cmp(&b.description))
        });
    }
}
