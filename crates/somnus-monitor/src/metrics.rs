//! Host metrics collaborator

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One metrics reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl MetricsSample {
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("Metrics unavailable: {0}")]
    Unavailable(String),
}

/// Source of host metrics, polled once per tick
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> Result<MetricsSample, MetricsError>;
}

/// Metrics source returning a settable reading.
pub struct StaticMetricsSource {
    sample: RwLock<Result<MetricsSample, MetricsError>>,
}

impl StaticMetricsSource {
    pub fn new(sample: MetricsSample) -> Self {
        Self {
            sample: RwLock::new(Ok(sample)),
        }
    }

    pub fn set(&self, sample: MetricsSample) {
        *self.sample.write() = Ok(sample);
    }

    /// Make subsequent samples fail.
    pub fn fail(&self, reason: impl Into<String>) {
        *self.sample.write() = Err(MetricsError::Unavailable(reason.into()));
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    async fn sample(&self) -> Result<MetricsSample, MetricsError> {
        self.sample.read().clone()
    }
}
