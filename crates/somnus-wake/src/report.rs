//! Per-id results of bulk wake operations

use serde::{Deserialize, Serialize};
use somnus_types::FunctionId;

/// Result of waking one function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeOutcome {
    pub id: FunctionId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WakeOutcome {
    pub fn success(id: FunctionId) -> Self {
        Self {
            id,
            ok: true,
            error: None,
        }
    }

    pub fn failure(id: FunctionId, error: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Complete outcome list of a bulk wake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeReport {
    pub outcomes: Vec<WakeOutcome>,
}

impl WakeReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn woken(&self) -> impl Iterator<Item = &FunctionId> {
        self.outcomes.iter().filter(|o| o.ok).map(|o| &o.id)
    }

    pub fn failed(&self) -> impl Iterator<Item = &WakeOutcome> {
        self.outcomes.iter().filter(|o| !o.ok)
    }

    /// Some ids woke and some did not.
    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failed().count();
        failed > 0 && failed < self.outcomes.len()
    }

    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok)
    }

    pub fn outcome(&self, id: &FunctionId) -> Option<&WakeOutcome> {
        self.outcomes.iter().find(|o| &o.id == id)
    }
}
