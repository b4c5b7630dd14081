//! External collaborator contracts
//!
//! The engine reads manifests and artifacts and asks for state writes; it
//! never stores anything itself. Implementations must make each single
//! `update_state` call atomic (row-level compare-and-swap on `updated_at`).

use crate::error::{PolicyDenied, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use trk_manifest::{ArtifactId, ManifestBundle, ProjectId};
use trk_transition::{Artifact, StateChange};

/// Action name checked against an artifact's permission set
pub const TRANSITION_ACTION: &str = "transition";

/// Read access to per-project manifests
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the current bundle for `project`
    async fn get_manifest(&self, project: &ProjectId) -> Result<Arc<ManifestBundle>, StoreError>;
}

/// Artifact persistence
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch an artifact snapshot
    async fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError>;

    /// Apply `change` atomically
    ///
    /// When `expected_updated_at` is `Some`, the write must fail with
    /// `StoreError::Conflict` unless it equals the stored `updated_at`.
    /// A successful write refreshes `updated_at`.
    async fn update_state(
        &self,
        id: &ArtifactId,
        change: &StateChange,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<Artifact, StoreError>;
}

/// Authorization collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// Allow or refuse `action` on `artifact`
    async fn authorize(&self, artifact: &Artifact, action: &str) -> Result<(), PolicyDenied>;
}

/// Manifest source backed by a fixed map
#[derive(Debug, Default)]
pub struct StaticManifestSource {
    bundles: DashMap<ProjectId, Arc<ManifestBundle>>,
}

impl StaticManifestSource {
    /// Create empty source
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source serving one bundle for one project
    #[must_use]
    pub fn single(project: impl Into<ProjectId>, bundle: ManifestBundle) -> Self {
        let source = Self::new();
        source.insert(project, bundle);
        source
    }

    /// Register or replace a project's bundle
    pub fn insert(&self, project: impl Into<ProjectId>, bundle: ManifestBundle) {
        self.bundles.insert(project.into(), Arc::new(bundle));
    }
}

#[async_trait]
impl ManifestSource for StaticManifestSource {
    async fn get_manifest(&self, project: &ProjectId) -> Result<Arc<ManifestBundle>, StoreError> {
        self.bundles
            .get(project)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::NotFound(format!("manifest for project {project}")))
    }
}
