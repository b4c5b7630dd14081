//! Transition resolver
//!
//! Pure lookups over a [`ManifestBundle`]: which moves are legal for an
//! artifact type in a given state, and which triggers a whole selection of
//! artifacts shares.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use trk_manifest::{ManifestBundle, StateId, Transition, Workflow};

/// One legal move from the current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermittedTransition {
    /// Trigger name, if the edge declares one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Destination state
    pub to_state: StateId,
    /// Display label: the trigger, else the destination's display name
    pub label: String,
}

impl PermittedTransition {
    fn from_edge(workflow: &Workflow, edge: &Transition) -> Self {
        let label = match &edge.trigger {
            Some(trigger) => trigger.clone(),
            None => workflow
                .state(edge.to.as_str())
                .map_or_else(|| edge.to.to_string(), |s| s.display_name().to_string()),
        };
        Self {
            trigger: edge.trigger.clone(),
            to_state: edge.to.clone(),
            label,
        }
    }
}

/// Trigger offered for every artifact in a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonTrigger {
    /// Trigger name
    pub trigger: String,
    /// Destination as resolved for the first artifact
    pub to_state: StateId,
    /// Label as resolved for the first artifact
    pub label: String,
}

/// Legal moves for `artifact_type` in `current_state`, in manifest declaration order
///
/// Empty when the type is unknown, has no workflow, or its workflow is absent
/// from the bundle.
#[must_use]
pub fn permitted_transitions(
    bundle: &ManifestBundle,
    artifact_type: &str,
    current_state: &str,
) -> Vec<PermittedTransition> {
    let Some(workflow) = bundle.workflow_for(artifact_type) else {
        return Vec::new();
    };
    workflow
        .outgoing(current_state)
        .map(|edge| PermittedTransition::from_edge(workflow, edge))
        .collect()
}

/// First permitted entry carrying `trigger`
#[must_use]
pub fn find_by_trigger<'a>(
    permitted: &'a [PermittedTransition],
    trigger: &str,
) -> Option<&'a PermittedTransition> {
    permitted
        .iter()
        .find(|p| p.trigger.as_deref() == Some(trigger))
}

/// First permitted entry reaching `state`
#[must_use]
pub fn find_by_state<'a>(
    permitted: &'a [PermittedTransition],
    state: &str,
) -> Option<&'a PermittedTransition> {
    permitted.iter().find(|p| p.to_state == state)
}

/// Triggers present in every list
///
/// Keeps the first list's order and display data. A `None` entry stands for
/// a lookup that failed; any failure, or an empty input, yields no triggers.
#[must_use]
pub fn common_triggers(lists: &[Option<Vec<PermittedTransition>>]) -> Vec<CommonTrigger> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    let Some(first) = first else {
        return Vec::new();
    };

    let mut others = Vec::with_capacity(rest.len());
    for list in rest {
        let Some(list) = list else {
            return Vec::new();
        };
        let triggers: HashSet<&str> = list.iter().filter_map(|p| p.trigger.as_deref()).collect();
        others.push(triggers);
    }

    let mut seen = HashSet::new();
    first
        .iter()
        .filter_map(|p| p.trigger.as_deref().map(|t| (t, p)))
        .filter(|(trigger, _)| seen.insert(*trigger))
        .filter(|(trigger, _)| others.iter().all(|set| set.contains(trigger)))
        .map(|(trigger, p)| CommonTrigger {
            trigger: trigger.to_string(),
            to_state: p.to_state.clone(),
            label: p.label.clone(),
        })
        .collect()
}
