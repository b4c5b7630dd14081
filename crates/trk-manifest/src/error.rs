//! Error types for manifest loading and validation

use crate::id::{ArtifactTypeId, StateId, WorkflowId};
use std::path::PathBuf;

/// Errors raised while parsing or validating a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// JSON document could not be decoded
    #[error("invalid manifest json: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML document could not be decoded
    #[error("invalid manifest yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension does not name a known format
    #[error("unsupported manifest format: '{0}'")]
    UnsupportedFormat(String),

    /// Two workflows share an id
    #[error("duplicate workflow id: {0}")]
    DuplicateWorkflow(WorkflowId),

    /// Two artifact types share an id
    #[error("duplicate artifact type id: {0}")]
    DuplicateArtifactType(ArtifactTypeId),

    /// A workflow declares the same state twice
    #[error("workflow {workflow}: duplicate state id {state}")]
    DuplicateState { workflow: WorkflowId, state: StateId },

    /// A transition endpoint names a state the workflow does not declare
    #[error("workflow {workflow}: transition {from} -> {to} references undeclared state {missing}")]
    UndeclaredState {
        workflow: WorkflowId,
        from: StateId,
        to: StateId,
        missing: StateId,
    },

    /// The same trigger leaves one state more than once
    #[error("workflow {workflow}: trigger '{trigger}' is declared more than once from state {from}")]
    DuplicateTrigger {
        workflow: WorkflowId,
        from: StateId,
        trigger: String,
    },

    /// An option enumeration repeats an id
    #[error("workflow {workflow}: duplicate {field} option id '{option}'")]
    DuplicateOption {
        workflow: WorkflowId,
        field: &'static str,
        option: String,
    },
}

impl ManifestError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the manifest was syntactically readable but structurally invalid
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::Json(_) | Self::Yaml(_) | Self::Io { .. } | Self::UnsupportedFormat(_)
        )
    }
}
