//! Somnus Registry - Versioned storage for function records
//!
//! This crate provides the single authoritative mutator of registry state:
//!
//! - **RegistryStore**: `get` / `list` / compare-and-swap `upsert`
//! - **InMemoryRegistryStore**: lock-free per-record CAS over a concurrent map
//! - **FileRegistryStore**: the same CAS semantics, flushed in the background as a versioned
//!   JSON document that is validated (and migrated) on open
//!
//! ## Concurrency
//!
//! Every write is a single-record compare-and-swap on `version`. There is no
//! whole-registry lock for readers; `list` returns a snapshot consistent as of
//! the call. Components other than the store never touch the backing file.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod file;
pub mod memory;
pub mod schema;
pub mod store;

// Re-exports
pub use error::{RegistryError, Result};
pub use file::FileRegistryStore;
pub use memory::InMemoryRegistryStore;
pub use schema::{RegistryDocument, CURRENT_SCHEMA_VERSION};
pub use store::RegistryStore;
