//! Subcommand implementations
//!
//! Each command returns a JSON [`Report`]; `main` prints it and maps
//! `success` to the exit status.

use crate::workspace::Workspace;
use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use trk_core::ResultCode;
use trk_manifest::{ArtifactId, ManifestBundle};
use trk_transition::{TransitionCommand, TransitionRequest};

/// Command output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// JSON body printed on stdout
    pub body: Value,
    /// Whether the command fully succeeded
    pub success: bool,
}

impl Report {
    fn ok(body: Value) -> Self {
        Self {
            body,
            success: true,
        }
    }
}

/// Validate a manifest file and describe its workflows
///
/// # Errors
/// Unreadable or structurally invalid manifest
pub fn check(manifest: &Path) -> anyhow::Result<Report> {
    let bundle = ManifestBundle::load(manifest)
        .with_context(|| format!("checking manifest {}", manifest.display()))?;

    let workflows: Vec<Value> = bundle
        .workflows()
        .map(|workflow| {
            let terminal: Vec<&str> = workflow
                .states()
                .filter(|s| workflow.is_terminal(s.id.as_str()))
                .map(|s| s.id.as_str())
                .collect();
            json!({
                "id": workflow.id(),
                "states": workflow.state_count(),
                "transitions": workflow.transitions().len(),
                "terminal_states": terminal,
                "resolution_options": workflow.resolution_options().len(),
            })
        })
        .collect();
    let unbound: Vec<&str> = bundle
        .artifact_types()
        .filter(|t| {
            t.workflow_id
                .as_ref()
                .is_some_and(|w| bundle.workflow(w.as_str()).is_none())
        })
        .map(|t| t.id.as_str())
        .collect();

    Ok(Report::ok(json!({
        "valid": true,
        "summary": bundle.summary(),
        "workflows": workflows,
        "unbound_types": unbound,
    })))
}

/// Legal moves for one artifact
///
/// # Errors
/// Missing artifact or unavailable manifest
pub async fn permitted(workspace: &Workspace, id: &ArtifactId) -> anyhow::Result<Report> {
    let items = workspace.engine().permitted_transitions(id).await?;
    let state = workspace
        .store()
        .snapshot(id.as_str())
        .map(|a| a.state)
        .unwrap_or_default();
    Ok(Report::ok(json!({
        "artifact_id": id,
        "state": state,
        "items": items,
    })))
}

/// Single transition
///
/// Engine rejections are reported in the body, not as errors.
///
/// # Errors
/// Failure to save the updated artifacts
pub async fn transition(
    workspace: &Workspace,
    command: &TransitionCommand,
    save: bool,
) -> anyhow::Result<Report> {
    match workspace.engine().submit(command).await {
        Ok(artifact) => {
            if save {
                workspace.save()?;
            }
            Ok(Report::ok(json!({
                "result": ResultCode::Ok,
                "artifact": artifact,
            })))
        }
        Err(err) => {
            let mut body = json!({
                "result": err.result_code(),
                "message": err.user_message(),
            });
            if let Some(current) = err.current_artifact() {
                body["current"] = serde_json::to_value(current)?;
            }
            Ok(Report {
                body,
                success: false,
            })
        }
    }
}

/// Batch transition
///
/// # Errors
/// Failure to save the updated artifacts
pub async fn batch(
    workspace: &Workspace,
    ids: &[ArtifactId],
    request: &TransitionRequest,
    save: bool,
) -> anyhow::Result<Report> {
    let result = workspace.coordinator().apply_batch(ids, request).await;
    if save && result.success_count > 0 {
        workspace.save()?;
    }
    Ok(Report {
        success: result.is_success(),
        body: serde_json::to_value(&result)?,
    })
}

/// Triggers shared by a selection
///
/// # Errors
/// Never fails once the workspace is loaded
pub async fn common(workspace: &Workspace, ids: &[ArtifactId]) -> anyhow::Result<Report> {
    let items = workspace.coordinator().common_triggers(ids).await;
    let distinct: HashSet<&ArtifactId> = ids.iter().collect();
    let considered = distinct
        .len()
        .min(workspace.engine().config().prefetch_limit);
    Ok(Report::ok(json!({
        "considered": considered,
        "items": items,
    })))
}
