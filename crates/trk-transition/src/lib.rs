//! TRK Transition Engine Core
//!
//! Pure, synchronous workflow transition logic over a [`trk_manifest::ManifestBundle`].
//!
//! # Core Concepts
//!
//! - [`permitted_transitions`]: legal moves for an artifact type in a state
//! - [`common_triggers`]: triggers shared by a whole selection
//! - [`TransitionValidator`]: request → [`NormalizedCommand`] or [`Rejection`]
//! - [`apply`]: optimistic-concurrency checked application to a snapshot
//!
//! Nothing here performs I/O or keeps state between calls; every function is
//! determined by (bundle, artifact snapshot, request).
//!
//! # Example
//!
//! ```rust,ignore
//! use trk_transition::{apply, TransitionRequest, TransitionValidator};
//!
//! let request = TransitionRequest::trigger("close").with_resolution("fixed");
//! let command = TransitionValidator::new().validate(&bundle, &artifact, &request)?;
//! let updated = apply(&artifact, &command)?;
//! ```

#![warn(unreachable_pub)]

mod artifact;
mod command;
mod error;
mod executor;
mod resolver;
mod validator;

pub use artifact::{Artifact, FieldUpdate, StateChange};
pub use command::{NormalizedCommand, TransitionCommand, TransitionRequest};
pub use error::{ApplyError, Rejection, RejectionCode};
pub use executor::{apply, check_concurrency};
pub use resolver::{
    common_triggers, find_by_state, find_by_trigger, permitted_transitions, CommonTrigger,
    PermittedTransition,
};
pub use validator::{requires_resolution, TransitionValidator, RESOLUTION_STATE_NAMES};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
