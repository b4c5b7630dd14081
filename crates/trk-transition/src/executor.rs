//! Single-transition executor
//!
//! Applies one validated command to one snapshot. Exactly two outcomes: the
//! projected artifact, or a tagged failure with the input left untouched.

use crate::artifact::Artifact;
use crate::command::NormalizedCommand;
use crate::error::ApplyError;
use chrono::{DateTime, Utc};

/// Compare-and-fail check on `updated_at`
///
/// `None` skips the check (explicit overwrite). Equality is exact.
///
/// # Errors
/// `ApplyError::Conflict` when the expectation is stale
pub fn check_concurrency(
    artifact: &Artifact,
    expected_updated_at: Option<DateTime<Utc>>,
) -> Result<(), ApplyError> {
    match expected_updated_at {
        Some(expected) if expected != artifact.updated_at => Err(ApplyError::Conflict {
            artifact_id: artifact.id.clone(),
            expected,
            actual: artifact.updated_at,
        }),
        _ => Ok(()),
    }
}

/// Project `command` onto `artifact`
///
/// The returned snapshot carries the new state and field updates; its
/// `updated_at` is still the old value until persistence refreshes it.
///
/// # Errors
/// `ApplyError::Conflict` on a stale expectation
pub fn apply(artifact: &Artifact, command: &NormalizedCommand) -> Result<Artifact, ApplyError> {
    check_concurrency(artifact, command.expected_updated_at)?;

    let mut updated = artifact.clone();
    command.state_change().apply_to(&mut updated);
    tracing::debug!(
        "Applied transition to {}: {} -> {}",
        artifact.id,
        artifact.state,
        updated.state
    );
    Ok(updated)
}
