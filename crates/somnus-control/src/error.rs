//! Error types for the control plane

use somnus_types::FunctionId;
use thiserror::Error;

/// Control plane error type
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Registry subsystem error
    #[error("Registry error: {0}")]
    Registry(#[from] somnus_registry::RegistryError),

    /// Lifecycle subsystem error
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] somnus_lifecycle::LifecycleError),

    /// Monitor subsystem error
    #[error("Monitor error: {0}")]
    Monitor(#[from] somnus_monitor::MonitorError),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Builder was missing a required collaborator
    #[error("Not initialized: {0}")]
    NotInitialized(&'static str),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for control plane operations
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

impl ControlPlaneError {
    /// Create a not found error for a function
    pub fn function_not_found(id: &FunctionId) -> Self {
        Self::NotFound(format!("Function {}", id))
    }

    /// Whether the error means the id is unknown, whichever layer reported it.
    pub fn is_not_found(&self) -> bool {
        match self {
            ControlPlaneError::NotFound(_) => true,
            ControlPlaneError::Registry(somnus_registry::RegistryError::NotFound(_)) => true,
            ControlPlaneError::Lifecycle(e) => e.is_not_found(),
            _ => false,
        }
    }
}
