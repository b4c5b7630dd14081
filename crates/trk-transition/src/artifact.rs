//! Artifact snapshots
//!
//! The engine never owns artifacts. It reads a snapshot supplied by the
//! persistence collaborator and describes the write it wants as a
//! [`StateChange`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use trk_manifest::{ArtifactId, ArtifactTypeId, ProjectId, StateId};

/// Point-in-time view of a tracked work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact id
    pub id: ArtifactId,
    /// Owning project (selects the manifest bundle)
    #[serde(default)]
    pub project: ProjectId,
    /// Artifact type id
    pub artifact_type: ArtifactTypeId,
    /// Current workflow state
    pub state: StateId,
    /// Why the artifact is in its state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
    /// Outcome recorded on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Last modification time, owned by persistence
    pub updated_at: DateTime<Utc>,
    /// Opaque permission set; `None` means no restriction was supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<BTreeSet<String>>,
}

impl Artifact {
    /// Create snapshot with no reason, resolution or permission set
    #[must_use]
    pub fn new(
        id: impl Into<ArtifactId>,
        artifact_type: impl Into<ArtifactTypeId>,
        state: impl Into<StateId>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project: ProjectId::default(),
            artifact_type: artifact_type.into(),
            state: state.into(),
            state_reason: None,
            resolution: None,
            updated_at,
            allowed_actions: None,
        }
    }

    /// In project
    #[inline]
    #[must_use]
    pub fn in_project(mut self, project: impl Into<ProjectId>) -> Self {
        self.project = project.into();
        self
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

    /// With permission set
    #[must_use]
    pub fn with_allowed_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }
}

/// Tri-state update for an optional text field
///
/// "Clear the reason" and "leave the reason alone" are different requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum FieldUpdate {
    /// Leave the stored value untouched
    #[default]
    Keep,
    /// Remove the stored value
    Clear,
    /// Overwrite with a new value
    Set(String),
}

impl FieldUpdate {
    /// Interpret a request field: absent keeps, empty string clears
    #[must_use]
    pub fn from_request(value: Option<&str>) -> Self {
        match value {
            None => Self::Keep,
            Some("") => Self::Clear,
            Some(v) => Self::Set(v.to_string()),
        }
    }

    /// Value being written, if any
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Set(v) => Some(v),
            Self::Keep | Self::Clear => None,
        }
    }

    /// Whether the field is left untouched
    #[inline]
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Apply to a stored value
    pub fn apply_to(&self, field: &mut Option<String>) {
        match self {
            Self::Keep => {}
            Self::Clear => *field = None,
            Self::Set(v) => *field = Some(v.clone()),
        }
    }
}

/// Write requested of the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// New state
    pub to_state: StateId,
    /// Reason update
    #[serde(default)]
    pub state_reason: FieldUpdate,
    /// Resolution update
    #[serde(default)]
    pub resolution: FieldUpdate,
}

impl StateChange {
    /// Apply to a snapshot; `updated_at` is left for persistence to refresh
    pub fn apply_to(&self, artifact: &mut Artifact) {
        artifact.state = self.to_state.clone();
        self.state_reason.apply_to(&mut artifact.state_reason);
        self.resolution.apply_to(&mut artifact.resolution);
    }
}
