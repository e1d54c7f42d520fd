//! Somnus Control Plane
//!
//! Unified facade over the Somnus subsystems:
//!
//! - **Registry**: authoritative function records behind compare-and-swap
//! - **Risk**: snapshot-based classification and sleep candidate selection
//! - **Lifecycle**: the Active/Sleeping/Disabled state machine
//! - **Monitor**: periodic resource checks, alerts and proposals
//! - **Wake**: manual, emergency and dependency-triggered wake-ups
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use somnus_control::SomnusControlPlaneBuilder;
//! use somnus_monitor::{MetricsSample, StaticMetricsSource};
//! use somnus_types::{FunctionMeta, TransitionAction, TransitionOptions};
//!
//! # async fn example() -> somnus_control::Result<()> {
//! let control_plane = SomnusControlPlaneBuilder::new()
//!     .with_metrics(Arc::new(StaticMetricsSource::new(MetricsSample::new(20.0, 40.0))))
//!     .build()?;
//!
//! let record = control_plane
//!     .register_function(FunctionMeta::new("report-export", "Report export"))
//!     .await?;
//!
//! for id in control_plane.propose_sleep_candidates(5).await? {
//!     control_plane
//!         .transition(&id, TransitionAction::Sleep, TransitionOptions::default())
//!         .await?;
//! }
//! # let _ = record;
//! # Ok(())
//! # }
//! ```
//!
//! ## Event Aggregation
//!
//! Registrations, committed and compensated transitions, alerts, proposals
//! and bulk wake results all arrive on one stream:
//!
//! ```rust,no_run
//! # use somnus_control::SomnusControlPlane;
//! # fn example(cp: &SomnusControlPlane) {
//! let mut events = cp.subscribe_events();
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod builder;
pub mod control_plane;
pub mod error;
pub mod events;

// Re-exports
pub use builder::SomnusControlPlaneBuilder;
pub use control_plane::SomnusControlPlane;
pub use error::{ControlPlaneError, Result};
pub use events::{EventAggregator, EventForwarderBuilder, ForwardStats};
