//! Error types for the transition engine
//!
//! Provides error handling for:
//! - Validation rejections (never retried)
//! - Optimistic-concurrency conflicts (caller may reload or overwrite)
//! - Policy denials from the authorization collaborator
//! - Collaborator failures (manifest source, artifact store)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trk_manifest::{ArtifactId, ProjectId};
use trk_transition::{Artifact, Rejection};

/// Per-item outcome code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Transition applied
    Ok,
    /// Request not admissible, or the artifact could not be processed
    ValidationError,
    /// Authorization refused
    PolicyDenied,
    /// Stale `updated_at` expectation
    ConflictError,
}

impl ResultCode {
    /// Stable label, also used as a metrics label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ValidationError => "validation_error",
            Self::PolicyDenied => "policy_denied",
            Self::ConflictError => "conflict_error",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be decoded
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors reported by collaborators (manifest source, artifact store)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record under this key
    #[error("not found: {0}")]
    NotFound(String),

    /// Compare-and-swap on `updated_at` failed; carries the stored record
    #[error("stale write for artifact {}", .current.id)]
    Conflict { current: Box<Artifact> },

    /// Backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Transition history errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Hash chain broken at `index`
    #[error("history integrity violation at event {index}")]
    IntegrityViolation { index: usize },
}

/// Authorization refusal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PolicyDenied(pub String);

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Request not admissible
    #[error("validation failed: {0}")]
    Validation(#[from] Rejection),

    /// Optimistic concurrency mismatch
    #[error("conflict: {detail}")]
    Conflict {
        /// Human-readable explanation
        detail: String,
        /// Stored artifact at the time of the conflict
        current: Box<Artifact>,
    },

    /// Authorization refused
    #[error("policy denied: {0}")]
    PolicyDenied(#[from] PolicyDenied),

    /// Artifact does not exist
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    /// Manifest for the project could not be obtained
    #[error("manifest unavailable for project {project}: {reason}")]
    ManifestUnavailable { project: ProjectId, reason: String },

    /// Storage collaborator failure
    #[error("store error: {0}")]
    Store(StoreError),

    /// Processing of one item panicked
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Outcome code for batch reporting
    #[must_use]
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Conflict { .. } => ResultCode::ConflictError,
            Self::PolicyDenied(_) => ResultCode::PolicyDenied,
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::ManifestUnavailable { .. }
            | Self::Store(_)
            | Self::Internal(_) => ResultCode::ValidationError,
        }
    }

    /// Whether the caller can recover (reload and retry, or overwrite)
    ///
    /// The engine itself never retries.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Stored artifact attached to a conflict
    #[inline]
    #[must_use]
    pub fn current_artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Conflict { current, .. } => Some(current.as_ref()),
            _ => None,
        }
    }

    /// Sentence suitable for end users
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(rejection) => rejection.message.clone(),
            Self::Conflict { detail, .. } => detail.clone(),
            Self::PolicyDenied(denied) => denied.0.clone(),
            Self::NotFound(id) => format!("Artifact {id} was not found."),
            Self::ManifestUnavailable { project, .. } => {
                format!("The workflow manifest for project {project} could not be loaded.")
            }
            Self::Store(err) => format!("The artifact could not be updated: {err}."),
            Self::Internal(_) => "The artifact could not be processed.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trk_transition::RejectionCode;

    #[test]
    fn result_codes() {
        let rejection = Rejection::new(RejectionCode::NoTarget, "No target.");
        assert_eq!(
            EngineError::Validation(rejection).result_code(),
            ResultCode::ValidationError
        );
        assert_eq!(
            EngineError::PolicyDenied(PolicyDenied("no".into())).result_code(),
            ResultCode::PolicyDenied
        );
        let conflict = EngineError::Conflict {
            detail: "stale".into(),
            current: Box::new(Artifact::new("A", "bug", "new", Utc::now())),
        };
        assert_eq!(conflict.result_code(), ResultCode::ConflictError);
        assert!(conflict.is_retryable());
        assert!(conflict.current_artifact().is_some());
    }

    #[test]
    fn user_messages_are_sentences() {
        let err = EngineError::NotFound(ArtifactId::new("BUG-404"));
        assert_eq!(err.user_message(), "Artifact BUG-404 was not found.");
        assert!(!err.is_retryable());
    }

    #[test]
    fn result_code_serializes_snake_case() {
        let json = serde_json::to_string(&ResultCode::ConflictError).unwrap();
        assert_eq!(json, "\"conflict_error\"");
        assert_eq!(ResultCode::PolicyDenied.to_string(), "policy_denied");
    }
}
