//! Testing utilities for TRK workspace
//!
//! Shared fixtures: the sample manifest, artifact factories and seeded engines.
//!
//! The sample manifest declares:
//! - `bug` workflow: new / active / resolved / closed, with reason and
//!   resolution options and a `reassign` self-loop on `active`
//! - `task` workflow: todo / doing / done / archived, no options
//! - `note` type without a workflow
//! - `orphan` type bound to a workflow that does not exist

#![allow(missing_docs)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use trk_core::{
    BatchCoordinator, EngineConfig, InMemoryArtifactStore, StaticManifestSource, TransitionEngine,
};
use trk_manifest::{ArtifactId, ManifestBundle, ProjectId};
use trk_transition::Artifact;

pub const SAMPLE_MANIFEST_YAML: &str = include_str!("../fixtures/sample_manifest.yaml");

pub fn sample_bundle() -> ManifestBundle {
    ManifestBundle::from_yaml_str(SAMPLE_MANIFEST_YAML).unwrap()
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 15, 10, 0, 0).unwrap()
}

pub fn artifact(id: &str, artifact_type: &str, state: &str) -> Artifact {
    Artifact::new(id, artifact_type, state, fixed_time())
}

pub fn bug(id: &str, state: &str) -> Artifact {
    artifact(id, "bug", state)
}

pub fn task(id: &str, state: &str) -> Artifact {
    artifact(id, "task", state)
}

pub fn ids(raw: &[&str]) -> Vec<ArtifactId> {
    raw.iter().map(|id| ArtifactId::new(*id)).collect()
}

pub fn seeded_store(artifacts: impl IntoIterator<Item = Artifact>) -> Arc<InMemoryArtifactStore> {
    Arc::new(InMemoryArtifactStore::from_artifacts(artifacts))
}

pub fn engine_over(
    store: Arc<InMemoryArtifactStore>,
    config: EngineConfig,
) -> Arc<TransitionEngine> {
    let manifests = Arc::new(StaticManifestSource::single(
        ProjectId::default(),
        sample_bundle(),
    ));
    Arc::new(TransitionEngine::builder(store, manifests).config(config).build())
}

pub fn setup_engine(
    artifacts: impl IntoIterator<Item = Artifact>,
) -> (Arc<InMemoryArtifactStore>, Arc<TransitionEngine>) {
    let store = seeded_store(artifacts);
    let engine = engine_over(store.clone(), EngineConfig::default());
    (store, engine)
}

pub fn setup_batch(
    artifacts: impl IntoIterator<Item = Artifact>,
) -> (Arc<InMemoryArtifactStore>, BatchCoordinator) {
    let (store, engine) = setup_engine(artifacts);
    (store, BatchCoordinator::new(engine))
}
