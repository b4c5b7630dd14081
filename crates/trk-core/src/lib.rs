//! TRK Core - workflow transition orchestration
//!
//! Runs transitions against external collaborators:
//! - [`ManifestSource`] supplies per-project manifests (cached by [`ManifestCache`])
//! - [`ArtifactStore`] reads snapshots and performs compare-and-swap writes
//! - [`PolicyGate`] authorizes the `transition` action
//!
//! [`TransitionEngine`] handles one artifact at a time; [`BatchCoordinator`]
//! fans a request out over many and reports per-item outcomes in a
//! [`BatchResult`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trk_core::{BatchCoordinator, InMemoryArtifactStore, StaticManifestSource, TransitionEngine};
//! use trk_transition::TransitionRequest;
//!
//! # async fn example(bundle: trk_manifest::ManifestBundle) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryArtifactStore::new());
//! let manifests = Arc::new(StaticManifestSource::single("default", bundle));
//! let engine = Arc::new(TransitionEngine::builder(store, manifests).build());
//!
//! let batch = BatchCoordinator::new(engine);
//! let result = batch.apply_batch(&ids, &TransitionRequest::trigger("close")).await;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod batch;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod policy;
pub mod store;

pub use batch::{BatchCoordinator, BatchResult};
pub use cache::ManifestCache;
pub use collaborators::{
    ArtifactStore, ManifestSource, PolicyGate, StaticManifestSource, TRANSITION_ACTION,
};
pub use config::EngineConfig;
pub use engine::{EngineBuilder, TransitionEngine};
pub use error::{ConfigError, EngineError, HistoryError, PolicyDenied, ResultCode, StoreError};
pub use history::{EventId, TransitionEvent, TransitionHistory, DEFAULT_HISTORY_CAPACITY};
pub use policy::{AllowAll, AllowedActionsPolicy};
pub use store::InMemoryArtifactStore;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with TRK Core
    pub use crate::{
        BatchCoordinator, BatchResult, EngineConfig, EngineError, InMemoryArtifactStore,
        ResultCode, StaticManifestSource, TransitionEngine,
    };
    pub use trk_transition::{Artifact, TransitionRequest};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
