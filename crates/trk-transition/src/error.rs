//! Rejections and apply errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trk_manifest::ArtifactId;

/// Why a request was rejected before any write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    /// No permitted transition carries the requested trigger
    TriggerNotPermitted,
    /// The requested state is not reachable from the current state
    StateNotPermitted,
    /// Neither trigger nor destination was given
    NoTarget,
    /// Destination requires a resolution and none was given
    ResolutionRequired,
    /// Reason outside the workflow's declared options
    UnknownStateReason,
    /// Resolution outside the workflow's declared options
    UnknownResolution,
}

/// Validation rejection with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Rejection {
    /// Machine-readable reason
    pub code: RejectionCode,
    /// Sentence suitable for end users
    pub message: String,
}

impl Rejection {
    /// Create rejection
    #[inline]
    #[must_use]
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors from applying a normalized command to a snapshot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// Optimistic concurrency mismatch
    #[error("Artifact {artifact_id} was modified at {actual}, but the request expected {expected}. Reload it or overwrite.")]
    Conflict {
        artifact_id: ArtifactId,
        expected: DateTime<Utc>,
        actual: DateTime<Utc>,
    },

    /// Command failed validation
    #[error(transparent)]
    Validation(#[from] Rejection),
}

impl ApplyError {
    /// Whether this is a concurrency conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_displays_message_only() {
        let r = Rejection::new(RejectionCode::NoTarget, "Choose a trigger or a state.");
        assert_eq!(r.to_string(), "Choose a trigger or a state.");
    }

    #[test]
    fn conflict_message_names_artifact() {
        let now = Utc::now();
        let err = ApplyError::Conflict {
            artifact_id: ArtifactId::new("BUG-9"),
            expected: now,
            actual: now,
        };
        assert!(err.to_string().starts_with("Artifact BUG-9 was modified"));
        assert!(err.is_conflict());
    }
}
