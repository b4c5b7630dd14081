//! TRK Manifest Model
//!
//! Immutable, validated representation of a project's process definition.
//!
//! # Core Concepts
//!
//! - [`Workflow`]: Finite state machine (states + transition edges) with option enumerations
//! - [`ArtifactTypeDef`]: Artifact type, optionally bound to one workflow
//! - [`ManifestBundle`]: Root aggregate of workflows and artifact types
//! - Typed identifiers ([`StateId`], [`WorkflowId`], [`ArtifactTypeId`], ...)
//!
//! A bundle is validated exactly once, when it is built or loaded. Lookups
//! afterwards never re-check structural invariants.
//!
//! # Example
//!
//! ```rust,ignore
//! use trk_manifest::ManifestBundle;
//!
//! let bundle = ManifestBundle::load("manifest.yaml")?;
//! let workflow = bundle.workflow_for("bug").unwrap();
//! for edge in workflow.outgoing("active") {
//!     println!("{} -> {}", edge.from, edge.to);
//! }
//! ```

#![warn(unreachable_pub)]

mod bundle;
mod document;
mod error;
mod id;
mod workflow;

pub use bundle::{ArtifactTypeDef, ManifestBundle, ManifestSummary};
pub use document::{ManifestDocument, ManifestFormat, WorkflowDocument};
pub use error::ManifestError;
pub use id::{ArtifactId, ArtifactTypeId, ProjectId, StateId, WorkflowId};
pub use workflow::{ChoiceOption, State, StateCategory, Transition, Workflow, WorkflowBuilder};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
