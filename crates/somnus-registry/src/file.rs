//! File-backed registry store
//!
//! Writes commit against an in-memory index with the same per-record
//! compare-and-swap as [`InMemoryRegistryStore`]. A single background flusher
//! then writes the whole index out as a [`RegistryDocument`], coalescing any
//! writes that landed while it was busy. The document goes to a sibling temp
//! file and is renamed into place, so a crash never leaves a half-written
//! registry behind.
//!
//! A write is durable once a flush that started after it completes. Call
//! [`FileRegistryStore::flush`] to wait for that; `close` always flushes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use somnus_types::{FunctionFilter, FunctionId, FunctionRecord};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{RegistryError, Result};
use crate::memory::InMemoryRegistryStore;
use crate::schema::RegistryDocument;
use crate::store::RegistryStore;

/// Registry store persisted to a JSON file
pub struct FileRegistryStore {
    shared: Arc<Shared>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    path: PathBuf,
    index: InMemoryRegistryStore,
    /// Bumped after every committed write.
    generation: AtomicU64,
    dirty: Notify,
    /// Last generation known to be on disk. Only file I/O takes this lock.
    flushed: tokio::sync::Mutex<u64>,
}

impl FileRegistryStore {
    /// Open the registry at `path`, creating an empty one if the file does not exist.
    ///
    /// Any malformed content is a fatal `CorruptRegistry` error; nothing is
    /// partially loaded. Must be called from within a Tokio runtime.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| RegistryError::Storage(e.to_string()))?;

        if !exists {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| RegistryError::Storage(e.to_string()))?;
                }
            }
            let shared = Shared::new(path, InMemoryRegistryStore::new());
            shared.persist(Vec::new()).await?;
            info!(path = %shared.path.display(), "Created empty registry");
            return Ok(Self::start(shared));
        }

        let document = Self::load_document(&path).await?;
        warn_dangling(&document.records);

        info!(
            path = %path.display(),
            records = document.records.len(),
            "Registry loaded"
        );

        Ok(Self::start(Shared::new(
            path,
            InMemoryRegistryStore::from_records(document.records),
        )))
    }

    fn start(shared: Shared) -> Self {
        let shared = Arc::new(shared);
        let flusher = tokio::spawn(run_flusher(shared.clone()));
        Self {
            shared,
            flusher: Mutex::new(Some(flusher)),
        }
    }

    /// Read and validate a registry document without opening a store.
    pub async fn load_document(path: &Path) -> Result<RegistryDocument> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RegistryError::corrupt(path, format!("unreadable: {}", e)))?;

        let document =
            RegistryDocument::parse(&raw).map_err(|reason| RegistryError::corrupt(path, reason))?;
        document
            .validate()
            .map_err(|reason| RegistryError::corrupt(path, reason))?;
        Ok(document)
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Write every committed record to disk, returning once they are durable.
    pub async fn flush(&self) -> Result<()> {
        self.shared.flush().await
    }
}

impl Drop for FileRegistryStore {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.get_mut().take() {
            flusher.abort();
        }
    }
}

impl Shared {
    fn new(path: PathBuf, index: InMemoryRegistryStore) -> Self {
        Self {
            path,
            index,
            generation: AtomicU64::new(0),
            dirty: Notify::new(),
            flushed: tokio::sync::Mutex::new(0),
        }
    }

    fn mark_dirty(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.dirty.notify_one();
    }

    async fn flush(&self) -> Result<()> {
        let mut flushed = self.flushed.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        if generation == *flushed {
            return Ok(());
        }
        self.persist(self.index.records_sorted()).await?;
        *flushed = generation;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "registry.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn persist(&self, records: Vec<FunctionRecord>) -> Result<()> {
        let count = records.len();
        let document = RegistryDocument::new(records);
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| RegistryError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| RegistryError::Storage(format!("write {}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            RegistryError::Storage(format!("rename into {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), records = count, "Registry flushed");
        Ok(())
    }
}

/// Flush whenever writes are pending. Runs until the store is dropped.
async fn run_flusher(shared: Arc<Shared>) {
    loop {
        shared.dirty.notified().await;
        if let Err(e) = shared.flush().await {
            // Stays dirty; the next write or close retries.
            warn!(path = %shared.path.display(), error = %e, "Background registry flush failed");
        }
    }
}

fn warn_dangling(records: &[FunctionRecord]) {
    let known: BTreeSet<&FunctionId> = records.iter().map(|r| &r.id).collect();
    for record in records {
        for dep in &record.depends_on {
            if !known.contains(dep) {
                warn!(
                    function_id = %record.id,
                    dependency = %dep,
                    "Dependency references an unregistered function"
                );
            }
        }
    }
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn get(&self, id: &FunctionId) -> Result<FunctionRecord> {
        self.shared.index.get(id).await
    }

    async fn list(&self, filter: &FunctionFilter) -> Result<Vec<FunctionRecord>> {
        self.shared.index.list(filter).await
    }

    async fn upsert(
        &self,
        record: FunctionRecord,
        expected_version: u64,
    ) -> Result<FunctionRecord> {
        let stored = self.shared.index.compare_and_swap(record, expected_version)?;
        self.shared.mark_dirty();
        Ok(stored)
    }

    async fn count(&self) -> Result<usize> {
        self.shared.index.count().await
    }

    async fn close(&self) -> Result<()> {
        self.shared.index.mark_closed();
        self.shared.flush().await?;
        if let Some(flusher) = self.flusher.lock().take() {
            flusher.abort();
            info!(path = %self.shared.path.display(), "Registry closed");
        }
        Ok(())
    }
}
