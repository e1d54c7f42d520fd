//! Monitor error types

use somnus_registry::RegistryError;
use somnus_types::AlertId;
use thiserror::Error;

/// Monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Alert not found: {0}")]
    AlertNotFound(AlertId),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;
