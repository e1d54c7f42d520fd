//! Somnus Monitor - Periodic resource and population monitoring
//!
//! A single [`MonitorLoop`] task samples host metrics and the registry once
//! per interval, raises at most one [`Alert`](somnus_types::Alert) per breached
//! threshold, and publishes a batch of sleep candidates. It never applies a
//! transition itself.
//!
//! Alert delivery is non-blocking: alerts go through a bounded queue to the
//! [`AlertSink`], and a full or closed queue drops the alert with a warning
//! instead of stalling the tick. Every failure inside a tick is logged and
//! reported in the [`TickReport`]; none ends the loop.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod alerts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod sink;

pub use alerts::AlertLog;
pub use config::{AlertThresholds, MonitorConfig};
pub use error::{MonitorError, Result};
pub use metrics::{MetricsError, MetricsSample, MetricsSource, StaticMetricsSource};
pub use monitor::{MonitorHandle, MonitorLoop, TickReport};
pub use sink::{AlertDispatcher, AlertSink, DispatchError, LogAlertSink, MemoryAlertSink, SinkError};
