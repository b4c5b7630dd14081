//! Fixture-backed engine setup
//!
//! A manifest file plus a JSON array of artifact snapshots stand in for the
//! manifest and persistence services.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trk_core::{
    BatchCoordinator, EngineConfig, InMemoryArtifactStore, StaticManifestSource, TransitionEngine,
};
use trk_manifest::{ManifestBundle, ProjectId};
use trk_transition::Artifact;

/// Engine wired to on-disk fixtures
#[derive(Debug)]
pub struct Workspace {
    artifacts_path: PathBuf,
    store: Arc<InMemoryArtifactStore>,
    engine: Arc<TransitionEngine>,
}

impl Workspace {
    /// Load manifest and artifacts
    ///
    /// Every artifact is served the same manifest, whatever its project.
    ///
    /// # Errors
    /// Unreadable or invalid files
    pub fn load(manifest: &Path, artifacts: &Path, config: EngineConfig) -> anyhow::Result<Self> {
        let bundle = ManifestBundle::load(manifest)
            .with_context(|| format!("loading manifest {}", manifest.display()))?;
        let snapshots = read_artifacts(artifacts)?;

        let manifests = StaticManifestSource::new();
        let projects: std::collections::BTreeSet<ProjectId> =
            snapshots.iter().map(|a| a.project.clone()).collect();
        for project in projects {
            manifests.insert(project, bundle.clone());
        }
        tracing::debug!("Loaded {} artifacts from {}", snapshots.len(), artifacts.display());

        let store = Arc::new(InMemoryArtifactStore::from_artifacts(snapshots));
        let engine = TransitionEngine::builder(store.clone(), Arc::new(manifests))
            .config(config)
            .build();
        Ok(Self {
            artifacts_path: artifacts.to_path_buf(),
            store,
            engine: Arc::new(engine),
        })
    }

    /// Single-transition engine
    #[must_use]
    pub fn engine(&self) -> &Arc<TransitionEngine> {
        &self.engine
    }

    /// Batch coordinator over the same engine
    #[must_use]
    pub fn coordinator(&self) -> BatchCoordinator {
        BatchCoordinator::new(Arc::clone(&self.engine))
    }

    /// Current artifact table
    #[must_use]
    pub fn store(&self) -> &InMemoryArtifactStore {
        &self.store
    }

    /// Write the artifact table back to the artifacts file
    ///
    /// # Errors
    /// Serialization or IO failure
    pub fn save(&self) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&self.store.artifacts())?;
        std::fs::write(&self.artifacts_path, text + "\n")
            .with_context(|| format!("writing {}", self.artifacts_path.display()))?;
        Ok(())
    }
}

/// Read a JSON array of artifact snapshots
///
/// # Errors
/// Unreadable file or malformed JSON
pub fn read_artifacts(path: &Path) -> anyhow::Result<Vec<Artifact>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading artifacts {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing artifacts {}", path.display()))
}
