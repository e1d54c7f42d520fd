//! Somnus Daemon library
//!
//! Components of the `somnusd` process:
//! - Configuration loading
//! - procfs metrics source
//! - Server lifecycle (monitor loop with graceful shutdown)
//! - One-shot `check` and `analyze` commands

#![deny(unsafe_code)]

pub mod commands;
pub mod config;
pub mod error;
pub mod proc_metrics;
pub mod server;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use proc_metrics::ProcMetricsSource;
pub use server::Server;
