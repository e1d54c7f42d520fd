//! Risk analyzer

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use somnus_graph::DependencyGraph;
use somnus_types::{
    FunctionId, FunctionRecord, FunctionStatus, RiskFinding, RiskFindingType, RiskSeverity,
};
use tracing::debug;

use crate::class::{RiskAssessment, RiskClass};

/// Analyzer tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// A critical function with more dependencies than this is classed CRITICAL
    pub critical_dependency_limit: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            critical_dependency_limit: 5,
        }
    }
}

/// Pure, reentrant risk analyzer
#[derive(Debug, Clone, Default)]
pub struct RiskAnalyzer {
    config: RiskConfig,
}

impl RiskAnalyzer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Classify every non-Disabled record, ordered by id.
    pub fn assess(
        &self,
        snapshot: &[FunctionRecord],
        graph: &DependencyGraph,
    ) -> Vec<RiskAssessment> {
        let by_id: HashMap<&FunctionId, &FunctionRecord> =
            snapshot.iter().map(|r| (&r.id, r)).collect();

        let mut assessments: Vec<RiskAssessment> = snapshot
            .iter()
            .filter(|r| r.status != FunctionStatus::Disabled)
            .map(|record| self.classify(record, &by_id, graph))
            .collect();
        assessments.sort_by(|a, b| a.function_id.cmp(&b.function_id));
        assessments
    }

    fn classify(
        &self,
        record: &FunctionRecord,
        by_id: &HashMap<&FunctionId, &FunctionRecord>,
        graph: &DependencyGraph,
    ) -> RiskAssessment {
        let is_critical_id = |id: &FunctionId| by_id.get(id).map(|r| r.is_critical).unwrap_or(false);

        let forward = graph.forward_deps(&record.id);
        let reverse = graph.reverse_deps(&record.id);

        let (class, reason) = if record.is_critical
            && forward.len() > self.config.critical_dependency_limit
        {
            (RiskClass::Critical, RiskFindingType::CriticalDependencyLoad)
        } else if reverse.iter().any(|id| is_critical_id(id)) {
            (RiskClass::High, RiskFindingType::CriticalConsumer)
        } else if forward.iter().any(|id| is_critical_id(id)) {
            (RiskClass::High, RiskFindingType::CriticalProvider)
        } else if record.security_level.is_elevated() && !record.is_critical {
            (RiskClass::Medium, RiskFindingType::SecurityMisclassification)
        } else if record.is_critical {
            (RiskClass::Low, RiskFindingType::CriticalProtected)
        } else {
            (RiskClass::Low, RiskFindingType::SleepEligible)
        };

        let candidate =
            record.status == FunctionStatus::Active && !record.is_critical && class.is_sleepable();

        RiskAssessment {
            function_id: record.id.clone(),
            class,
            reason,
            security_level: record.security_level,
            dependents: reverse.len(),
            candidate,
        }
    }

    /// Derive all findings for a snapshot, sorted by severity then id.
    pub fn analyze(&self, snapshot: &[FunctionRecord], graph: &DependencyGraph) -> Vec<RiskFinding> {
        let mut findings: Vec<RiskFinding> = self
            .assess(snapshot, graph)
            .iter()
            .map(|a| self.finding_for(a, graph))
            .collect();

        findings.extend(graph.cycle_findings());
        findings.extend(graph.dangling_findings());
        findings.extend(
            snapshot
                .iter()
                .filter(|r| r.is_critical && r.is_sleeping())
                .map(|r| {
                    RiskFinding::new(
                        RiskFindingType::CriticalSleeping,
                        RiskSeverity::Critical,
                        r.id.clone(),
                        format!("Critical function {} is sleeping", r.id),
                        "Wake it unless the override that put it to sleep is still justified",
                    )
                }),
        );

        RiskFinding::sort(&mut findings);
        debug!(
            records = snapshot.len(),
            findings = findings.len(),
            "Risk analysis complete"
        );
        findings
    }

    fn finding_for(&self, assessment: &RiskAssessment, graph: &DependencyGraph) -> RiskFinding {
        let id = &assessment.function_id;
        let (description, recommendation) = match assessment.reason {
            RiskFindingType::CriticalDependencyLoad => (
                format!(
                    "Critical function with {} dependencies (limit {})",
                    graph.forward_deps(id).len(),
                    self.config.critical_dependency_limit
                ),
                "Never sleep; review whether every dependency is required".to_string(),
            ),
            RiskFindingType::CriticalConsumer => (
                format!("Critical consumers depend on {}", id),
                "Do not sleep; a critical consumer would lose this dependency".to_string(),
            ),
            RiskFindingType::CriticalProvider => (
                format!("{} depends on a critical function", id),
                "Do not sleep; keep it alongside its critical provider".to_string(),
            ),
            RiskFindingType::SecurityMisclassification => (
                format!(
                    "Security level {} without critical protection",
                    assessment.security_level
                ),
                "Review classification; consider marking it critical".to_string(),
            ),
            RiskFindingType::CriticalProtected => (
                format!("{} is critical and protected from sleep", id),
                "None; critical functions are never proposed for sleep".to_string(),
            ),
            _ => (
                format!("{} has {} dependents", id, assessment.dependents),
                "Safe to sleep".to_string(),
            ),
        };

        RiskFinding::new(
            assessment.reason,
            assessment.class.severity(),
            id.clone(),
            description,
            recommendation,
        )
    }

    /// Pick up to `max_batch` sleep candidates, safest first.
    ///
    /// Order is (class, dependents, id). Critical records and HIGH/CRITICAL
    /// classes are never returned.
    pub fn propose_sleep_candidates(
        &self,
        snapshot: &[FunctionRecord],
        graph: &DependencyGraph,
        max_batch: usize,
    ) -> Vec<FunctionId> {
        let mut candidates: Vec<RiskAssessment> = self
            .assess(snapshot, graph)
            .into_iter()
            .filter(|a| a.candidate)
            .collect();

        candidates.sort_by(|a, b| {
            a.class
                .cmp(&b.class)
                .then_with(|| a.dependents.cmp(&b.dependents))
                .then_with(|| a.function_id.cmp(&b.function_id))
        });

        candidates
            .into_iter()
            .take(max_batch)
            .map(|a| a.function_id)
            .collect()
    }
}
