//! One-shot subcommands

use serde::Serialize;
use somnus_registry::{FileRegistryStore, RegistryStore};
use somnus_risk::RiskAssessment;
use somnus_types::{FunctionId, RiskFinding};
use tracing::info;

use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::server::Server;

/// Summary of a registry check
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub functions: usize,
    pub sleeping: usize,
}

/// Output of `somnusd analyze`
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub findings: Vec<RiskFinding>,
    pub assessments: Vec<RiskAssessment>,
    pub candidates: Vec<FunctionId>,
}

/// Load and validate the registry without modifying it.
pub async fn check(config: &DaemonConfig) -> DaemonResult<CheckSummary> {
    if !tokio::fs::try_exists(&config.registry_path).await? {
        return Err(DaemonError::Config(format!(
            "registry not found at {}",
            config.registry_path.display()
        )));
    }

    let store = FileRegistryStore::open(&config.registry_path).await?;
    let snapshot = store.snapshot().await?;
    let summary = CheckSummary {
        functions: snapshot.len(),
        sleeping: snapshot.iter().filter(|r| r.is_sleeping()).count(),
    };
    info!(
        functions = summary.functions,
        sleeping = summary.sleeping,
        "Registry is valid"
    );
    Ok(summary)
}

/// Findings, classifications and up to `max_batch` sleep candidates.
pub async fn analyze(config: &DaemonConfig, max_batch: usize) -> DaemonResult<AnalysisReport> {
    let server = Server::new(config.clone()).await?;
    let control_plane = server.control_plane();

    Ok(AnalysisReport {
        findings: control_plane.analyze_risks().await?,
        assessments: control_plane.assess_risks().await?,
        candidates: control_plane.propose_sleep_candidates(max_batch).await?,
    })
}
