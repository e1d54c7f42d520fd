//! Risk classes and per-record assessments

use serde::{Deserialize, Serialize};
use somnus_types::{FunctionId, RiskFindingType, RiskSeverity, SecurityLevel};

/// Risk class of a record. Ordered from safest to riskiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskClass {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskClass {
    pub fn severity(self) -> RiskSeverity {
        match self {
            RiskClass::Low => RiskSeverity::Low,
            RiskClass::Medium => RiskSeverity::Medium,
            RiskClass::High => RiskSeverity::High,
            RiskClass::Critical => RiskSeverity::Critical,
        }
    }

    /// Classes that may be proposed for sleep.
    pub fn is_sleepable(self) -> bool {
        matches!(self, RiskClass::Low | RiskClass::Medium)
    }
}

/// Classification of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub function_id: FunctionId,
    pub class: RiskClass,
    /// Rule that produced the class
    pub reason: RiskFindingType,
    pub security_level: SecurityLevel,
    /// Number of registered functions depending on this one
    pub dependents: usize,
    /// Whether the record may be proposed for sleep
    pub candidate: bool,
}
