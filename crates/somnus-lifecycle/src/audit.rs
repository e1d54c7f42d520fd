//! Transition audit log
//!
//! One entry per transition request that reached the registry. Overrides of
//! critical-function protection are flagged so they can be reviewed apart
//! from routine transitions.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use somnus_types::{FunctionId, FunctionStatus, TransitionAction};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Audit sink errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// How the transition ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The committed state stands
    Committed,
    /// The commit was reverted after the component runtime failed
    Compensated { reason: String },
}

/// A single audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub function_id: FunctionId,
    pub action: TransitionAction,
    pub from: FunctionStatus,
    pub to: FunctionStatus,
    /// Record version written by the transition
    pub version: u64,
    pub actor: Option<String>,
    /// Mandatory for overrides, optional otherwise
    pub reason: Option<String>,
    pub override_applied: bool,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
}

/// Destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append an entry
    async fn write(&self, entry: AuditEntry) -> AuditResult<()>;

    /// Number of entries written
    async fn entry_count(&self) -> AuditResult<u64>;
}

/// In-memory audit sink
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    /// Entries that overrode critical-function protection
    pub fn overrides(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.override_applied)
            .cloned()
            .collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, entry: AuditEntry) -> AuditResult<()> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn entry_count(&self) -> AuditResult<u64> {
        Ok(self.entries.read().len() as u64)
    }
}

/// Append-only JSON-lines audit file
pub struct JsonlAuditSink {
    path: PathBuf,
    count: AtomicU64,
    append_lock: Mutex<()>,
}

impl JsonlAuditSink {
    /// Open (or create) the audit file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        let count = if tokio::fs::try_exists(&path).await? {
            Self::read_entries(&path).await?.len() as u64
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            0
        };

        Ok(Self {
            path,
            count: AtomicU64::new(count),
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back from disk.
    pub async fn read_all(&self) -> AuditResult<Vec<AuditEntry>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        Self::read_entries(&self.path).await
    }

    async fn read_entries(path: &Path) -> AuditResult<Vec<AuditEntry>> {
        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut entries = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn write(&self, entry: AuditEntry) -> AuditResult<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.append_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn entry_count(&self) -> AuditResult<u64> {
        Ok(self.count.load(Ordering::Relaxed))
    }
}
