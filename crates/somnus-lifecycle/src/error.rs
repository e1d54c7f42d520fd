//! Lifecycle error types

use somnus_registry::RegistryError;
use somnus_types::{FunctionId, FunctionStatus, TransitionAction, ValidationError};
use thiserror::Error;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot {action} {id}: function is {from}")]
    InvalidTransition {
        id: FunctionId,
        from: FunctionStatus,
        action: TransitionAction,
    },

    #[error("Function {0} is critical; sleeping it requires an audited override")]
    ProtectedTransition(FunctionId),

    #[error("Concurrent modification of {id} persisted after {attempts} attempts")]
    ConcurrentModification { id: FunctionId, attempts: u32 },

    #[error("Transition of {id} exceeded its {budget_ms}ms budget")]
    TransitionTimeout { id: FunctionId, budget_ms: u64 },

    #[error("Component runtime failed to {action} {id}: {reason}")]
    Runtime {
        id: FunctionId,
        action: TransitionAction,
        reason: String,
    },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl LifecycleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LifecycleError::Registry(RegistryError::NotFound(_)))
    }
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
