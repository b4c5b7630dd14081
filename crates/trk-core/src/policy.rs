//! Built-in policy gates
//!
//! Authorization is evaluated elsewhere; the engine only consumes the
//! resulting permission set attached to each artifact.

use crate::collaborators::PolicyGate;
use crate::error::PolicyDenied;
use async_trait::async_trait;
use trk_transition::Artifact;

/// Allows every action
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PolicyGate for AllowAll {
    async fn authorize(&self, _artifact: &Artifact, _action: &str) -> Result<(), PolicyDenied> {
        Ok(())
    }
}

/// Consults the artifact's `allowed_actions` set
///
/// An artifact without a set is unrestricted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowedActionsPolicy;

#[async_trait]
impl PolicyGate for AllowedActionsPolicy {
    async fn authorize(&self, artifact: &Artifact, action: &str) -> Result<(), PolicyDenied> {
        match &artifact.allowed_actions {
            Some(actions) if !actions.contains(action) => Err(PolicyDenied(format!(
                "You are not allowed to {action} artifact {}.",
                artifact.id
            ))),
            _ => Ok(()),
        }
    }
}
