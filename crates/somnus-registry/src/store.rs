//! Registry store trait
//!
//! The RegistryStore is the only component allowed to mutate registry state.

use crate::error::Result;
use async_trait::async_trait;
use somnus_types::{FunctionFilter, FunctionId, FunctionRecord};

/// Versioned store of function records
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Get a record by id. Unknown ids yield `NotFound`.
    async fn get(&self, id: &FunctionId) -> Result<FunctionRecord>;

    /// List records matching `filter`, ordered by id.
    async fn list(&self, filter: &FunctionFilter) -> Result<Vec<FunctionRecord>>;

    /// Compare-and-swap a single record.
    ///
    /// Succeeds only when the stored version equals `expected_version`
    /// (`0` meaning "not yet stored"). The stored record receives version
    /// `expected_version + 1`, whatever version the argument carried.
    async fn upsert(&self, record: FunctionRecord, expected_version: u64)
        -> Result<FunctionRecord>;

    /// Insert a new record. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, record: FunctionRecord) -> Result<FunctionRecord> {
        self.upsert(record, 0).await
    }

    /// Snapshot of every record, ordered by id.
    async fn snapshot(&self) -> Result<Vec<FunctionRecord>> {
        self.list(&FunctionFilter::all()).await
    }

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Flush and refuse further writes.
    async fn close(&self) -> Result<()>;
}
