//! Somnus Graph - Dependency views built from a registry snapshot
//!
//! A [`DependencyGraph`] is built once per snapshot and is immutable
//! afterwards, so any number of readers can share it without locking.
//!
//! - `forward_deps(id)`: what `id` depends on
//! - `reverse_deps(id)`: what depends on `id`
//!
//! Dangling references (ids in `depends_on` that are not registered) are
//! kept as leaves: they appear in `forward_deps` but are never expanded.
//! Cycles are detected at build time and reported as findings, never
//! followed.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod cycles;
pub mod graph;

pub use graph::{DanglingRef, DependencyGraph};
