//! Wake orchestrator configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Maximum wakes in flight across all bulk operations
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}
