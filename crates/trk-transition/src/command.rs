//! Transition requests and normalized commands

use crate::artifact::{FieldUpdate, StateChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trk_manifest::{ArtifactId, StateId};

/// Caller's transition request body
///
/// `trigger` and `new_state` both select the destination; when both are set
/// the trigger wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Named trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Explicit destination state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<StateId>,
    /// Reason; empty string clears
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
    /// Resolution; empty string clears
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Optimistic-concurrency expectation; `None` skips the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    /// Request by trigger name
    #[inline]
    #[must_use]
    pub fn trigger(trigger: impl Into<String>) -> Self {
        Self {
            trigger: Some(trigger.into()),
            ..Self::default()
        }
    }

    /// Request by destination state
    #[inline]
    #[must_use]
    pub fn to_state(state: impl Into<StateId>) -> Self {
        Self {
            new_state: Some(state.into()),
            ..Self::default()
        }
    }

    /// With state reason
    #[inline]
    #[must_use]
    pub fn with_state_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_reason = Some(reason.into());
        self
    }

    /// With resolution
    #[inline]
    #[must_use]
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// With optimistic-concurrency expectation
    #[inline]
    #[must_use]
    pub fn expecting(mut self, updated_at: DateTime<Utc>) -> Self {
        self.expected_updated_at = Some(updated_at);
        self
    }

    /// Drop the expectation (explicit overwrite)
    #[inline]
    #[must_use]
    pub fn overwrite(mut self) -> Self {
        self.expected_updated_at = None;
        self
    }
}

/// Request addressed to one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCommand {
    /// Target artifact
    pub artifact_id: ArtifactId,
    /// Request body
    #[serde(flatten)]
    pub request: TransitionRequest,
}

impl TransitionCommand {
    /// Create command
    #[inline]
    #[must_use]
    pub fn new(artifact_id: impl Into<ArtifactId>, request: TransitionRequest) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            request,
        }
    }
}

/// Validated command with a concrete destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedCommand {
    /// Resolved destination
    pub to_state: StateId,
    /// Trigger that selected the destination, if any
    pub trigger: Option<String>,
    /// Reason update
    pub state_reason: FieldUpdate,
    /// Resolution update
    pub resolution: FieldUpdate,
    /// Optimistic-concurrency expectation
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl NormalizedCommand {
    /// Persistence payload for this command
    #[must_use]
    pub fn state_change(&self) -> StateChange {
        StateChange {
            to_state: self.to_state.clone(),
            state_reason: self.state_reason.clone(),
            resolution: self.resolution.clone(),
        }
    }
}
