//! Daemon error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(#[from] somnus_registry::RegistryError),

    #[error("Audit log error: {0}")]
    Audit(#[from] somnus_lifecycle::AuditError),

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] somnus_control::ControlPlaneError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(e: config::ConfigError) -> Self {
        DaemonError::Config(e.to_string())
    }
}

pub type DaemonResult<T> = Result<T, DaemonError>;
