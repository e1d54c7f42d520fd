//! In-memory registry store
//!
//! Per-record compare-and-swap over a sharded concurrent map. Also serves as
//! the in-memory index behind [`crate::FileRegistryStore`].

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use somnus_types::{FunctionFilter, FunctionId, FunctionRecord};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::store::RegistryStore;

/// In-memory registry store
pub struct InMemoryRegistryStore {
    records: DashMap<FunctionId, FunctionRecord>,
    closed: AtomicBool,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Build a store from already-validated records.
    pub fn from_records(records: impl IntoIterator<Item = FunctionRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.id.clone(), record);
        }
        store
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RegistryError::Closed);
        }
        Ok(())
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Apply a CAS atomically with respect to other writers of the same id.
    ///
    /// The closed flag is checked while the record's shard is held, so a
    /// snapshot taken after [`Self::mark_closed`] sees every accepted write.
    pub(crate) fn compare_and_swap(
        &self,
        mut record: FunctionRecord,
        expected_version: u64,
    ) -> Result<FunctionRecord> {
        record.version = expected_version + 1;
        record.check_invariants()?;

        let entry = self.records.entry(record.id.clone());
        self.ensure_open()?;
        match entry {
            Entry::Occupied(mut entry) => {
                let actual = entry.get().version;
                if expected_version == 0 {
                    return Err(RegistryError::AlreadyExists(record.id));
                }
                if actual != expected_version {
                    debug!(
                        function_id = %record.id,
                        expected = expected_version,
                        actual,
                        "Version mismatch on compare-and-swap"
                    );
                    return Err(RegistryError::ConcurrentModification {
                        id: record.id,
                        expected: expected_version,
                        actual,
                    });
                }
                entry.insert(record.clone());
                Ok(record)
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    return Err(RegistryError::NotFound(record.id));
                }
                entry.insert(record.clone());
                Ok(record)
            }
        }
    }

    pub(crate) fn records_sorted(&self) -> Vec<FunctionRecord> {
        let mut records: Vec<FunctionRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn get(&self, id: &FunctionId) -> Result<FunctionRecord> {
        self.records
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    async fn list(&self, filter: &FunctionFilter) -> Result<Vec<FunctionRecord>> {
        let mut records: Vec<FunctionRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn upsert(
        &self,
        record: FunctionRecord,
        expected_version: u64,
    ) -> Result<FunctionRecord> {
        self.compare_and_swap(record, expected_version)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn close(&self) -> Result<()> {
        self.mark_closed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use somnus_types::{FunctionMeta, FunctionStatus, SleepSnapshot};
    use std::sync::Arc;

    fn record(id: &str) -> FunctionRecord {
        FunctionRecord::from_meta(FunctionMeta::new(id, format!("{id}-name")), Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryRegistryStore::new();
        let stored = store.insert(record("F1")).await.unwrap();
        assert_eq!(stored.version, 1);

        let fetched = store.get(&FunctionId::new("F1")).await.unwrap();
        assert_eq!(fetched, stored);
        assert!(matches!(
            store.get(&FunctionId::new("missing")).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryRegistryStore::new();
        store.insert(record("F1")).await.unwrap();
        assert!(matches!(
            store.insert(record("F1")).await,
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_cas_bumps_version() {
        let store = InMemoryRegistryStore::new();
        let v1 = store.insert(record("F1")).await.unwrap();

        let mut next = v1.clone();
        next.name = "renamed".to_string();
        let v2 = store.upsert(next, v1.version).await.unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.name, "renamed");
    }

    #[tokio::test]
    async fn test_stale_version_rejected_without_write() {
        let store = InMemoryRegistryStore::new();
        let v1 = store.insert(record("F1")).await.unwrap();
        store.upsert(v1.clone(), 1).await.unwrap();

        let mut stale = v1.clone();
        stale.name = "lost update".to_string();
        let err = store.upsert(stale, 1).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ConcurrentModification {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(err.is_retryable());

        let current = store.get(&FunctionId::new("F1")).await.unwrap();
        assert_eq!(current.name, "F1-name");
        assert_eq!(current.version, 2);
    }

    #[tokio::test]
    async fn test_invariant_violation_rejected() {
        let store = InMemoryRegistryStore::new();
        let v1 = store.insert(record("F1")).await.unwrap();

        let mut broken = v1.clone();
        broken.status = FunctionStatus::Sleeping;
        assert!(matches!(
            store.upsert(broken.clone(), 1).await,
            Err(RegistryError::Validation(_))
        ));

        broken.sleep_snapshot = Some(SleepSnapshot {
            previous_status: FunctionStatus::Active,
            slept_at: Utc::now(),
        });
        assert!(store.upsert(broken, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_filtered() {
        let store = InMemoryRegistryStore::new();
        for id in ["F3", "F1", "F2"] {
            store.insert(record(id)).await.unwrap();
        }
        let mut critical = record("F0");
        critical.is_critical = true;
        store.insert(critical).await.unwrap();

        let all = store.snapshot().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["F0", "F1", "F2", "F3"]);

        let critical_only = store
            .list(&FunctionFilter::all().critical(true))
            .await
            .unwrap();
        assert_eq!(critical_only.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_writes() {
        let store = InMemoryRegistryStore::new();
        store.insert(record("F1")).await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(
            store.insert(record("F2")).await,
            Err(RegistryError::Closed)
        ));
        assert!(store.get(&FunctionId::new("F1")).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cas_single_winner() {
        let store = Arc::new(InMemoryRegistryStore::new());
        let base = store.insert(record("F1")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let mut candidate = base.clone();
            candidate.name = format!("writer-{i}");
            handles.push(tokio::spawn(async move {
                store.upsert(candidate, base.version).await
            }));
        }

        let mut winners = 0;
        let mut losers = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(RegistryError::ConcurrentModification { .. }) => losers += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(losers, 7);
        assert_eq!(store.get(&FunctionId::new("F1")).await.unwrap().version, 2);
    }
}
