//! Engine configuration
//!
//! Loaded from TOML; every key is optional and falls back to [`EngineConfig::default`].

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum artifacts processed concurrently in one batch
    pub batch_concurrency: usize,
    /// Maximum artifacts consulted when computing common triggers
    pub prefetch_limit: usize,
    /// Reject reason/resolution values outside the declared options
    pub strict_option_ids: bool,
    /// Manifest cache capacity (projects)
    pub manifest_cache_capacity: u64,
    /// Manifest cache time-to-live in seconds
    pub manifest_cache_ttl_secs: u64,
    /// Transition history events kept in memory; older events are evicted
    pub history_capacity: usize,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch concurrency
    #[inline]
    #[must_use]
    pub fn with_batch_concurrency(mut self, workers: usize) -> Self {
        self.batch_concurrency = workers;
        self
    }

    /// With prefetch limit
    #[inline]
    #[must_use]
    pub fn with_prefetch_limit(mut self, limit: usize) -> Self {
        self.prefetch_limit = limit;
        self
    }

    /// With option-id strictness
    #[inline]
    #[must_use]
    pub fn with_strict_option_ids(mut self, strict: bool) -> Self {
        self.strict_option_ids = strict;
        self
    }

    /// With history capacity
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Manifest cache TTL
    #[inline]
    #[must_use]
    pub fn manifest_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.manifest_cache_ttl_secs)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` when a value is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.manifest_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "manifest_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Parse or range errors
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// IO, parse or range errors
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: 8,
            prefetch_limit: 30,
            strict_option_ids: true,
            manifest_cache_capacity: 256,
            manifest_cache_ttl_secs: 60,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.batch_concurrency, 8);
        assert_eq!(config.prefetch_limit, 30);
        assert!(config.strict_option_ids);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            "batch_concurrency = 2\nstrict_option_ids = false\nhistory_capacity = 50\n",
        )
        .unwrap();
        assert_eq!(config.batch_concurrency, 2);
        assert!(!config.strict_option_ids);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.prefetch_limit, 30);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = EngineConfig::from_toml_str("batch_concurrency = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_toml_is_rejected() {
        let err = EngineConfig::from_toml_str("batch_concurrency = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "prefetch_limit = 5\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().prefetch_limit, 5);
    }
}
