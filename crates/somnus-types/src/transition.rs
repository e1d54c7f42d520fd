//! Lifecycle transition requests and results

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{FunctionRecord, FunctionStatus, RiskFinding, ValidationError};

/// Why a sleeping function is being woken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeReason {
    Manual,
    Emergency,
    DependencyTrigger,
}

impl WakeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            WakeReason::Manual => "manual",
            WakeReason::Emergency => "emergency",
            WakeReason::DependencyTrigger => "dependency-trigger",
        }
    }
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionAction {
    /// Active -> Sleeping
    Sleep,
    /// Sleeping -> previous status
    Wake { reason: WakeReason },
    /// Active -> Disabled
    Disable,
    /// Disabled -> Active
    Enable,
}

impl TransitionAction {
    pub fn wake(reason: WakeReason) -> Self {
        TransitionAction::Wake { reason }
    }

    /// Status a record must currently have for this action to apply.
    pub fn required_status(self) -> FunctionStatus {
        match self {
            TransitionAction::Sleep | TransitionAction::Disable => FunctionStatus::Active,
            TransitionAction::Wake { .. } => FunctionStatus::Sleeping,
            TransitionAction::Enable => FunctionStatus::Disabled,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransitionAction::Sleep => "sleep",
            TransitionAction::Wake { .. } => "wake",
            TransitionAction::Disable => "disable",
            TransitionAction::Enable => "enable",
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionAction::Wake { reason } => write!(f, "wake({})", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Options accompanying a transition request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOptions {
    /// Allow sleeping a critical function. Requires `audit_reason`.
    #[serde(default)]
    pub override_protection: bool,

    /// Mandatory justification when `override_protection` is set
    #[serde(default)]
    pub audit_reason: Option<String>,

    /// Who requested the transition
    #[serde(default)]
    pub actor: Option<String>,
}

impl TransitionOptions {
    /// Options for an audited override of critical-function protection.
    pub fn overridden(reason: impl Into<String>) -> Self {
        Self {
            override_protection: true,
            audit_reason: Some(reason.into()),
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// An override must carry a non-blank audit reason.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.override_protection {
            let has_reason = self
                .audit_reason
                .as_deref()
                .map(|r| !r.trim().is_empty())
                .unwrap_or(false);
            if !has_reason {
                return Err(ValidationError::MissingAuditReason);
            }
        }
        Ok(())
    }
}

/// Result of a committed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// The record as stored after the transition
    pub record: FunctionRecord,

    /// Non-blocking warnings raised by the transition
    pub warnings: Vec<RiskFinding>,

    /// Compare-and-swap attempts used (1 when uncontended)
    pub attempts: u32,

    /// Whether critical protection was overridden
    pub override_applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_status() {
        assert_eq!(TransitionAction::Sleep.required_status(), FunctionStatus::Active);
        assert_eq!(
            TransitionAction::wake(WakeReason::Manual).required_status(),
            FunctionStatus::Sleeping
        );
        assert_eq!(TransitionAction::Enable.required_status(), FunctionStatus::Disabled);
    }

    #[test]
    fn test_override_requires_reason() {
        let mut options = TransitionOptions {
            override_protection: true,
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(ValidationError::MissingAuditReason));

        options.audit_reason = Some("  ".to_string());
        assert!(options.validate().is_err());

        assert!(TransitionOptions::overridden("maintenance window").validate().is_ok());
        assert!(TransitionOptions::default().validate().is_ok());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(TransitionAction::Sleep.to_string(), "sleep");
        assert_eq!(
            TransitionAction::wake(WakeReason::DependencyTrigger).to_string(),
            "wake(dependency-trigger)"
        );
    }
}
