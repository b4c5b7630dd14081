//! Manifest bundle: the per-project root aggregate

use crate::error::ManifestError;
use crate::id::{ArtifactTypeId, WorkflowId};
use crate::workflow::Workflow;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Artifact type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactTypeDef {
    /// Type identifier
    pub id: ArtifactTypeId,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Bound workflow; absence means the type has no transitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
}

impl ArtifactTypeDef {
    /// Create type without workflow
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<ArtifactTypeId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            workflow_id: None,
        }
    }

    /// Bind to workflow
    #[inline]
    #[must_use]
    pub fn with_workflow(mut self, workflow_id: impl Into<WorkflowId>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Counts describing a loaded bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    /// Number of workflows
    pub workflows: usize,
    /// Number of artifact types
    pub artifact_types: usize,
    /// Total states across workflows
    pub states: usize,
    /// Total edges across workflows
    pub transitions: usize,
    /// Artifact types whose workflow id is not in the bundle
    pub unbound_types: usize,
}

/// Validated set of workflows and artifact types
///
/// Treated as immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestBundle {
    workflows: IndexMap<WorkflowId, Workflow>,
    artifact_types: IndexMap<ArtifactTypeId, ArtifactTypeDef>,
}

impl ManifestBundle {
    /// Assemble a bundle from validated workflows and type declarations
    ///
    /// Artifact types may reference a workflow id that is not present; such
    /// types resolve to an empty transition set.
    ///
    /// # Errors
    /// - `DuplicateWorkflow` / `DuplicateArtifactType` on repeated ids
    pub fn new(
        workflows: impl IntoIterator<Item = Workflow>,
        artifact_types: impl IntoIterator<Item = ArtifactTypeDef>,
    ) -> Result<Self, ManifestError> {
        let mut by_id = IndexMap::new();
        for workflow in workflows {
            if by_id.contains_key(workflow.id()) {
                return Err(ManifestError::DuplicateWorkflow(workflow.id().clone()));
            }
            by_id.insert(workflow.id().clone(), workflow);
        }

        let mut types = IndexMap::new();
        for def in artifact_types {
            if types.contains_key(&def.id) {
                return Err(ManifestError::DuplicateArtifactType(def.id));
            }
            if let Some(workflow_id) = &def.workflow_id {
                if !by_id.contains_key(workflow_id) {
                    tracing::warn!(
                        "Artifact type {} references unknown workflow {}",
                        def.id,
                        workflow_id
                    );
                }
            }
            types.insert(def.id.clone(), def);
        }

        let bundle = Self {
            workflows: by_id,
            artifact_types: types,
        };
        let summary = bundle.summary();
        tracing::debug!(
            "Manifest validated: {} workflows, {} artifact types, {} transitions",
            summary.workflows,
            summary.artifact_types,
            summary.transitions
        );
        Ok(bundle)
    }

    /// Empty bundle
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a workflow
    #[inline]
    #[must_use]
    pub fn workflow(&self, id: &str) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Look up an artifact type
    #[inline]
    #[must_use]
    pub fn artifact_type(&self, id: &str) -> Option<&ArtifactTypeDef> {
        self.artifact_types.get(id)
    }

    /// Workflow bound to an artifact type, if the type exists and its workflow is present
    #[must_use]
    pub fn workflow_for(&self, artifact_type: &str) -> Option<&Workflow> {
        let def = self.artifact_type(artifact_type)?;
        let workflow_id = def.workflow_id.as_ref()?;
        self.workflow(workflow_id.as_str())
    }

    /// Workflows in declaration order
    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values()
    }

    /// Artifact types in declaration order
    pub fn artifact_types(&self) -> impl Iterator<Item = &ArtifactTypeDef> {
        self.artifact_types.values()
    }

    /// Summary counts
    #[must_use]
    pub fn summary(&self) -> ManifestSummary {
        ManifestSummary {
            workflows: self.workflows.len(),
            artifact_types: self.artifact_types.len(),
            states: self.workflows.values().map(Workflow::state_count).sum(),
            transitions: self.workflows.values().map(|w| w.transitions().len()).sum(),
            unbound_types: self
                .artifact_types
                .values()
                .filter(|t| {
                    t.workflow_id
                        .as_ref()
                        .is_some_and(|w| !self.workflows.contains_key(w))
                })
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{State, Transition};

    fn workflow(id: &str) -> Workflow {
        Workflow::builder(id)
            .state(State::new("open"))
            .state(State::new("done"))
            .transition(Transition::new("open", "done"))
            .build()
            .unwrap()
    }

    #[test]
    fn workflow_for_follows_binding() {
        let bundle = ManifestBundle::new(
            [workflow("simple")],
            [ArtifactTypeDef::new("task").with_workflow("simple")],
        )
        .unwrap();

        assert_eq!(bundle.workflow_for("task").unwrap().id(), &WorkflowId::new("simple"));
        assert!(bundle.workflow_for("missing").is_none());
    }

    #[test]
    fn unbound_and_dangling_types_have_no_workflow() {
        let bundle = ManifestBundle::new(
            [workflow("simple")],
            [
                ArtifactTypeDef::new("note"),
                ArtifactTypeDef::new("ghost").with_workflow("nowhere"),
            ],
        )
        .unwrap();

        assert!(bundle.workflow_for("note").is_none());
        assert!(bundle.workflow_for("ghost").is_none());
        assert_eq!(bundle.summary().unbound_types, 1);
    }

    #[test]
    fn rejects_duplicate_workflow() {
        let err = ManifestBundle::new([workflow("a"), workflow("a")], Vec::<ArtifactTypeDef>::new())
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateWorkflow(_)));
    }

    #[test]
    fn rejects_duplicate_artifact_type() {
        let err = ManifestBundle::new(
            [workflow("a")],
            [ArtifactTypeDef::new("bug"), ArtifactTypeDef::new("bug")],
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateArtifactType(_)));
    }

    #[test]
    fn summary_counts() {
        let bundle = ManifestBundle::new(
            [workflow("a"), workflow("b")],
            [ArtifactTypeDef::new("x").with_workflow("a")],
        )
        .unwrap();
        let summary = bundle.summary();
        assert_eq!(summary.workflows, 2);
        assert_eq!(summary.states, 4);
        assert_eq!(summary.transitions, 2);
        assert_eq!(summary.unbound_types, 0);
    }
}
