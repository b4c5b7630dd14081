//! In-memory artifact store
//!
//! Row-level compare-and-swap on `updated_at` through the dashmap entry lock.
//! Every successful write moves `updated_at` strictly forward, so two writes
//! never share a timestamp.

use crate::collaborators::ArtifactStore;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use trk_manifest::ArtifactId;
use trk_transition::{Artifact, StateChange};

/// Concurrent in-memory artifact table
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: DashMap<ArtifactId, Artifact>,
}

impl InMemoryArtifactStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store seeded with artifacts
    #[must_use]
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let store = Self::new();
        for artifact in artifacts {
            store.insert(artifact);
        }
        store
    }

    /// Insert or replace an artifact verbatim
    pub fn insert(&self, artifact: Artifact) {
        self.artifacts.insert(artifact.id.clone(), artifact);
    }

    /// Current snapshot, if present
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<Artifact> {
        self.artifacts.get(id).map(|entry| entry.value().clone())
    }

    /// All artifacts, sorted by id
    #[must_use]
    pub fn artifacts(&self) -> Vec<Artifact> {
        let mut all: Vec<Artifact> = self.artifacts.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        self.snapshot(id.as_str())
            .ok_or_else(|| StoreError::NotFound(format!("artifact {id}")))
    }

    async fn update_state(
        &self,
        id: &ArtifactId,
        change: &StateChange,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<Artifact, StoreError> {
        let mut entry = self
            .artifacts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("artifact {id}")))?;
        let stored = entry.value_mut();

        if let Some(expected) = expected_updated_at {
            if expected != stored.updated_at {
                return Err(StoreError::Conflict {
                    current: Box::new(stored.clone()),
                });
            }
        }

        change.apply_to(stored);
        stored.updated_at = next_timestamp(stored.updated_at);
        Ok(stored.clone())
    }
}
