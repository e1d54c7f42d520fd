//! Component runtime hooks
//!
//! The controller tells the registered component to pause or resume after the
//! registry commit. Honoring the request is the component's business.

use std::collections::HashSet;

use async_trait::async_trait;
use somnus_types::FunctionId;
use thiserror::Error;
use tracing::debug;

/// Failure reported by a component runtime
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct RuntimeError {
    pub reason: String,
}

impl RuntimeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Pause/resume hooks of registered components
#[async_trait]
pub trait ComponentRuntime: Send + Sync {
    /// Called after a function was committed as Sleeping.
    async fn pause(&self, id: &FunctionId) -> Result<(), RuntimeError>;

    /// Called after a function was committed as Active again.
    async fn resume(&self, id: &FunctionId) -> Result<(), RuntimeError>;
}

/// Runtime that accepts every request.
pub struct NoOpComponentRuntime;

#[async_trait]
impl ComponentRuntime for NoOpComponentRuntime {
    async fn pause(&self, id: &FunctionId) -> Result<(), RuntimeError> {
        debug!(function_id = %id, "No-op pause");
        Ok(())
    }

    async fn resume(&self, id: &FunctionId) -> Result<(), RuntimeError> {
        debug!(function_id = %id, "No-op resume");
        Ok(())
    }
}

/// Runtime that refuses requests for specific functions.
#[derive(Default)]
pub struct FailingComponentRuntime {
    fail_pause: HashSet<FunctionId>,
    fail_resume: HashSet<FunctionId>,
}

impl FailingComponentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_pause(mut self, id: impl Into<FunctionId>) -> Self {
        self.fail_pause.insert(id.into());
        self
    }

    pub fn fail_resume(mut self, id: impl Into<FunctionId>) -> Self {
        self.fail_resume.insert(id.into());
        self
    }
}

#[async_trait]
impl ComponentRuntime for FailingComponentRuntime {
    async fn pause(&self, id: &FunctionId) -> Result<(), RuntimeError> {
        if self.fail_pause.contains(id) {
            return Err(RuntimeError::new(format!("simulated pause failure for {}", id)));
        }
        Ok(())
    }

    async fn resume(&self, id: &FunctionId) -> Result<(), RuntimeError> {
        if self.fail_resume.contains(id) {
            return Err(RuntimeError::new(format!("simulated resume failure for {}", id)));
        }
        Ok(())
    }
}
