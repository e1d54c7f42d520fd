//! Lifecycle controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Re-reads allowed after a lost compare-and-swap before giving up
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,

    /// Execution budget of a single transition in milliseconds
    #[serde(default = "default_transition_timeout_ms")]
    pub transition_timeout_ms: u64,

    /// Restore the previous status when a pause/resume hook fails
    #[serde(default = "default_true")]
    pub compensate_on_runtime_failure: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_cas_retries: default_max_cas_retries(),
            transition_timeout_ms: default_transition_timeout_ms(),
            compensate_on_runtime_failure: true,
        }
    }
}

impl LifecycleConfig {
    pub fn transition_timeout(&self) -> Duration {
        Duration::from_millis(self.transition_timeout_ms)
    }
}

fn default_max_cas_retries() -> u32 {
    3
}

fn default_transition_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}
