//! Function record types
//!
//! A FunctionRecord is the registry entry for one registered component.
//! Records are created once and never deleted; `Disabled` replaces deletion.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FunctionId;

/// Validation errors for records and registration metadata
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("function id must not be empty")]
    EmptyId,

    #[error("invalid function id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("function name must not be empty for {0}")]
    EmptyName(FunctionId),

    #[error("record {id} has invalid version {version}")]
    InvalidVersion { id: FunctionId, version: u64 },

    #[error("record {id} violates sleep snapshot invariant: status {status}, snapshot present: {has_snapshot}")]
    SnapshotMismatch {
        id: FunctionId,
        status: FunctionStatus,
        has_snapshot: bool,
    },

    #[error("audit reason is required when overriding protection")]
    MissingAuditReason,
}

/// Lifecycle status of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionStatus {
    /// Running normally
    Active,
    /// Suspended to save resources; resumable
    Sleeping,
    /// Administratively switched off
    Disabled,
}

impl FunctionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FunctionStatus::Active => "active",
            FunctionStatus::Sleeping => "sleeping",
            FunctionStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for FunctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security exposure of a function
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl SecurityLevel {
    /// High or critical exposure.
    pub fn is_elevated(self) -> bool {
        matches!(self, SecurityLevel::High | SecurityLevel::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Low => "low",
            SecurityLevel::Medium => "medium",
            SecurityLevel::High => "high",
            SecurityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State retained while a function sleeps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSnapshot {
    /// Status to restore on wake
    pub previous_status: FunctionStatus,

    /// When the function was put to sleep
    pub slept_at: DateTime<Utc>,
}

/// A registered function
///
/// Unknown fields are rejected on deserialization so that fields added by a
/// newer writer are detected instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionRecord {
    /// Unique, immutable identifier
    pub id: FunctionId,

    /// Human-readable name
    pub name: String,

    /// Current lifecycle status
    pub status: FunctionStatus,

    /// Never eligible for ordinary suspension
    pub is_critical: bool,

    /// Security exposure
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Ids this function needs. May reference ids absent from the registry.
    #[serde(default)]
    pub depends_on: BTreeSet<FunctionId>,

    /// Re-enable automatically when dependencies recover
    #[serde(default)]
    pub auto_enable: bool,

    /// Included in emergency wake-ups
    #[serde(default)]
    pub emergency_wake_up: bool,

    /// Optimistic concurrency token, strictly increasing on every mutation
    pub version: u64,

    /// Timestamp of the last lifecycle transition
    pub last_transition_at: DateTime<Utc>,

    /// Present only while sleeping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_snapshot: Option<SleepSnapshot>,

    /// Free-form metadata the orchestrator does not interpret
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl FunctionRecord {
    /// Build the initial record for a registration. Records start `Active` at version 1.
    pub fn from_meta(meta: FunctionMeta, now: DateTime<Utc>) -> Self {
        Self {
            id: meta.id,
            name: meta.name,
            status: FunctionStatus::Active,
            is_critical: meta.is_critical,
            security_level: meta.security_level,
            depends_on: meta.depends_on,
            auto_enable: meta.auto_enable,
            emergency_wake_up: meta.emergency_wake_up,
            version: 1,
            last_transition_at: now,
            sleep_snapshot: None,
            extensions: meta.extensions,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == FunctionStatus::Active
    }

    pub fn is_sleeping(&self) -> bool {
        self.status == FunctionStatus::Sleeping
    }

    pub fn is_disabled(&self) -> bool {
        self.status == FunctionStatus::Disabled
    }

    /// Check the structural invariants every stored record must satisfy.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.version == 0 {
            return Err(ValidationError::InvalidVersion {
                id: self.id.clone(),
                version: self.version,
            });
        }
        let has_snapshot = self.sleep_snapshot.is_some();
        if has_snapshot != self.is_sleeping() {
            return Err(ValidationError::SnapshotMismatch {
                id: self.id.clone(),
                status: self.status,
                has_snapshot,
            });
        }
        Ok(())
    }
}

/// Registration metadata for a new function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMeta {
    pub id: FunctionId,
    pub name: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub security_level: SecurityLevel,
    #[serde(default)]
    pub depends_on: BTreeSet<FunctionId>,
    #[serde(default)]
    pub auto_enable: bool,
    #[serde(default)]
    pub emergency_wake_up: bool,
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl FunctionMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: FunctionId::new(id),
            name: name.into(),
            is_critical: false,
            security_level: SecurityLevel::Low,
            depends_on: BTreeSet::new(),
            auto_enable: false,
            emergency_wake_up: false,
            extensions: BTreeMap::new(),
        }
    }

    pub fn critical(mut self, is_critical: bool) -> Self {
        self.is_critical = is_critical;
        self
    }

    pub fn security(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(FunctionId::new));
        self
    }

    pub fn emergency_wake_up(mut self, enabled: bool) -> Self {
        self.emergency_wake_up = enabled;
        self
    }

    pub fn auto_enable(mut self, enabled: bool) -> Self {
        self.auto_enable = enabled;
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Validate user-supplied metadata before registration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        FunctionId::parse(self.id.as_str())?;
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName(self.id.clone()));
        }
        Ok(())
    }
}

/// Filter for listing records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFilter {
    pub status: Option<FunctionStatus>,
    pub is_critical: Option<bool>,
    pub security_level: Option<SecurityLevel>,
    pub emergency_wake_up: Option<bool>,
    pub ids: Option<BTreeSet<FunctionId>>,
}

impl FunctionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: FunctionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn critical(mut self, is_critical: bool) -> Self {
        self.is_critical = Some(is_critical);
        self
    }

    pub fn emergency_wake_up(mut self, enabled: bool) -> Self {
        self.emergency_wake_up = Some(enabled);
        self
    }

    pub fn matches(&self, record: &FunctionRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(is_critical) = self.is_critical {
            if record.is_critical != is_critical {
                return false;
            }
        }
        if let Some(level) = self.security_level {
            if record.security_level != level {
                return false;
            }
        }
        if let Some(flag) = self.emergency_wake_up {
            if record.emergency_wake_up != flag {
                return false;
            }
        }
        if let Some(ref ids) = self.ids {
            if !ids.contains(&record.id) {
                return false;
            }
        }
        true
    }
}
