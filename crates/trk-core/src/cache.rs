//! Per-project manifest cache using moka
//!
//! Bundles are shared as `Arc<ManifestBundle>` and never mutated; a fresh
//! bundle replaces a cached one only after expiry or invalidation.

use crate::collaborators::ManifestSource;
use crate::config::EngineConfig;
use crate::error::StoreError;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use trk_manifest::{ManifestBundle, ProjectId};

/// Manifest cache keyed by project
#[derive(Debug, Clone)]
pub struct ManifestCache {
    inner: Cache<ProjectId, Arc<ManifestBundle>>,
}

impl ManifestCache {
    /// Create cache with capacity and time-to-live
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Create cache sized from engine configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.manifest_cache_capacity, config.manifest_cache_ttl())
    }

    /// Cached bundle, if present
    #[inline]
    pub async fn get(&self, project: &ProjectId) -> Option<Arc<ManifestBundle>> {
        self.inner.get(project).await
    }

    /// Get cached bundle or fetch it from `source`
    ///
    /// Concurrent misses for the same project share one fetch. Failed fetches
    /// are not cached.
    ///
    /// # Errors
    /// The source's error
    pub async fn get_or_load(
        &self,
        project: &ProjectId,
        source: &dyn ManifestSource,
    ) -> Result<Arc<ManifestBundle>, StoreError> {
        self.inner
            .try_get_with(project.clone(), async {
                let bundle = source.get_manifest(project).await?;
                tracing::debug!("Cached manifest for project {}", project);
                Ok::<_, StoreError>(bundle)
            })
            .await
            .map_err(|err| StoreError::clone(&err))
    }

    /// Drop one project's bundle
    #[inline]
    pub async fn invalidate(&self, project: &ProjectId) {
        self.inner.invalidate(project).await;
    }

    /// Drop every bundle
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ManifestSource for CountingSource {
        async fn get_manifest(
            &self,
            project: &ProjectId,
        ) -> Result<Arc<ManifestBundle>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if project == "missing" {
                return Err(StoreError::NotFound(format!(
                    "manifest for project {project}"
                )));
            }
            if project == "slow" {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Ok(Arc::new(ManifestBundle::empty()))
        }
    }

    #[tokio::test]
    async fn second_lookup_hits_cache() {
        let cache = ManifestCache::default();
        let source = CountingSource::default();
        let project = ProjectId::new("alpha");

        let first = cache.get_or_load(&project, &source).await.unwrap();
        let second = cache.get_or_load(&project, &source).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let cache = ManifestCache::default();
        let source = CountingSource::default();
        let project = ProjectId::new("slow");

        let loads = (0..8).map(|_| cache.get_or_load(&project, &source));
        let bundles = futures::future::join_all(loads).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let first = bundles[0].as_ref().unwrap();
        assert!(bundles
            .iter()
            .all(|b| Arc::ptr_eq(first, b.as_ref().unwrap())));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ManifestCache::default();
        let source = CountingSource::default();
        let project = ProjectId::new("missing");

        assert!(cache.get_or_load(&project, &source).await.is_err());
        assert!(cache.get_or_load(&project, &source).await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(cache.get(&project).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = ManifestCache::default();
        let source = CountingSource::default();
        let project = ProjectId::new("alpha");

        cache.get_or_load(&project, &source).await.unwrap();
        cache.invalidate(&project).await;
        cache.get_or_load(&project, &source).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
