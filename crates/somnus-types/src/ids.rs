//! Strongly-typed identifiers for Somnus entities
//!
//! Function ids are caller-chosen strings (registries routinely use names
//! such as `trading_bot_7`); alert ids are generated UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::record::ValidationError;

/// Unique, immutable identifier of a registered function
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(String);

impl FunctionId {
    /// Create an id without validation. Use [`FunctionId::parse`] for user input.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an id, rejecting empty or whitespace-only input.
    pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(ValidationError::InvalidId {
                id,
                reason: "leading or trailing whitespace".to_string(),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique identifier for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertId(Uuid);

impl AlertId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert:{}", self.0)
    }
}
