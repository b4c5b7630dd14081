//! Workflow state machines
//!
//! A [`Workflow`] is a set of declared states plus directed transition edges.
//! Legality is decided by edges alone; [`StateCategory`] is display metadata.
//!
//! Workflows are only obtainable through [`WorkflowBuilder::build`], which
//! enforces:
//! - state ids are unique
//! - every edge endpoint is a declared state
//! - a trigger name leaves a given state at most once
//! - option ids are unique within each enumeration

use crate::error::ManifestError;
use crate::id::{StateId, WorkflowId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// UI grouping for a state. Not authoritative for legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    /// Not yet started
    New,
    /// Work underway
    InProgress,
    /// Work finished
    Completed,
    /// Anything else
    Other,
}

/// Declared workflow state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// State identifier
    pub id: StateId,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional UI grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<StateCategory>,
    /// Explicit override for whether entering this state requires a resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_resolution: Option<bool>,
}

impl State {
    /// Create state with only an id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<StateId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            category: None,
            requires_resolution: None,
        }
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: StateCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// With explicit resolution requirement
    #[inline]
    #[must_use]
    pub fn with_requires_resolution(mut self, required: bool) -> Self {
        self.requires_resolution = Some(required);
        self
    }

    /// Display name, falling back to the id
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Directed transition edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Source state
    pub from: StateId,
    /// Destination state
    pub to: StateId,
    /// Optional trigger name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl Transition {
    /// Create untriggered edge
    #[inline]
    #[must_use]
    pub fn new(from: impl Into<StateId>, to: impl Into<StateId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            trigger: None,
        }
    }

    /// With trigger name
    #[inline]
    #[must_use]
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Whether the edge loops back to its source
    #[inline]
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Enumerated choice for `state_reason` / `resolution`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Stored value
    pub id: String,
    /// Display label
    pub label: String,
}

impl ChoiceOption {
    /// Create option
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Validated workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    id: WorkflowId,
    name: Option<String>,
    states: IndexMap<StateId, State>,
    transitions: Vec<Transition>,
    state_reason_options: Vec<ChoiceOption>,
    resolution_options: Vec<ChoiceOption>,
}

impl Workflow {
    /// Start building a workflow
    #[inline]
    #[must_use]
    pub fn builder(id: impl Into<WorkflowId>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    /// Workflow id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    /// Optional display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// States in declaration order
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Look up a declared state
    #[inline]
    #[must_use]
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    /// Number of declared states
    #[inline]
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// All edges in declaration order
    #[inline]
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Edges leaving `state`, in declaration order
    pub fn outgoing<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    /// Whether `state` has no outgoing edges
    ///
    /// Derived from the edge set; there is no terminal flag.
    #[must_use]
    pub fn is_terminal(&self, state: &str) -> bool {
        self.outgoing(state).next().is_none()
    }

    /// Declared `state_reason` options
    #[inline]
    #[must_use]
    pub fn state_reason_options(&self) -> &[ChoiceOption] {
        &self.state_reason_options
    }

    /// Declared `resolution` options
    #[inline]
    #[must_use]
    pub fn resolution_options(&self) -> &[ChoiceOption] {
        &self.resolution_options
    }

    /// Whether the workflow declares any resolution options
    #[inline]
    #[must_use]
    pub fn has_resolution_options(&self) -> bool {
        !self.resolution_options.is_empty()
    }
}

/// Builder for [`Workflow`]
///
/// Usage:
/// ```rust,ignore
/// let workflow = Workflow::builder("bug")
///     .state(State::new("new").named("New"))
///     .state(State::new("active").named("Active"))
///     .transition(Transition::new("new", "active").with_trigger("start"))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    id: WorkflowId,
    name: Option<String>,
    states: Vec<State>,
    transitions: Vec<Transition>,
    state_reason_options: Vec<ChoiceOption>,
    resolution_options: Vec<ChoiceOption>,
}

impl WorkflowBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new(id: impl Into<WorkflowId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            states: Vec::new(),
            transitions: Vec::new(),
            state_reason_options: Vec::new(),
            resolution_options: Vec::new(),
        }
    }

    /// With display name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a state
    #[must_use]
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Add several states
    #[must_use]
    pub fn states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.states.extend(states);
        self
    }

    /// Add an edge
    #[must_use]
    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add several edges
    #[must_use]
    pub fn transitions(mut self, transitions: impl IntoIterator<Item = Transition>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    /// Add a `state_reason` option
    #[must_use]
    pub fn state_reason_option(mut self, option: ChoiceOption) -> Self {
        self.state_reason_options.push(option);
        self
    }

    /// Add a `resolution` option
    #[must_use]
    pub fn resolution_option(mut self, option: ChoiceOption) -> Self {
        self.resolution_options.push(option);
        self
    }

    /// Replace both option enumerations
    #[must_use]
    pub fn options(
        mut self,
        state_reasons: Vec<ChoiceOption>,
        resolutions: Vec<ChoiceOption>,
    ) -> Self {
        self.state_reason_options = state_reasons;
        self.resolution_options = resolutions;
        self
    }

    /// Validate and produce the workflow
    ///
    /// # Errors
    /// - `DuplicateState` if a state id repeats
    /// - `UndeclaredState` if an edge names an unknown state
    /// - `DuplicateTrigger` if a trigger leaves one state twice
    /// - `DuplicateOption` if an option id repeats within an enumeration
    pub fn build(self) -> Result<Workflow, ManifestError> {
        let mut states = IndexMap::with_capacity(self.states.len());
        for state in self.states {
            if states.contains_key(&state.id) {
                return Err(ManifestError::DuplicateState {
                    workflow: self.id,
                    state: state.id,
                });
            }
            states.insert(state.id.clone(), state);
        }

        let mut triggers: HashSet<(&StateId, &str)> = HashSet::new();
        for edge in &self.transitions {
            for endpoint in [&edge.from, &edge.to] {
                if !states.contains_key(endpoint) {
                    return Err(ManifestError::UndeclaredState {
                        workflow: self.id.clone(),
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            if let Some(trigger) = edge.trigger.as_deref() {
                if !triggers.insert((&edge.from, trigger)) {
                    return Err(ManifestError::DuplicateTrigger {
                        workflow: self.id.clone(),
                        from: edge.from.clone(),
                        trigger: trigger.to_string(),
                    });
                }
            }
        }

        check_unique_options(&self.id, "state_reason", &self.state_reason_options)?;
        check_unique_options(&self.id, "resolution", &self.resolution_options)?;

        Ok(Workflow {
            id: self.id,
            name: self.name,
            states,
            transitions: self.transitions,
            state_reason_options: self.state_reason_options,
            resolution_options: self.resolution_options,
        })
    }
}

fn check_unique_options(
    workflow: &WorkflowId,
    field: &'static str,
    options: &[ChoiceOption],
) -> Result<(), ManifestError> {
    let mut seen = HashSet::with_capacity(options.len());
    for option in options {
        if !seen.insert(option.id.as_str()) {
            return Err(ManifestError::DuplicateOption {
                workflow: workflow.clone(),
                field,
                option: option.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bug_builder() -> WorkflowBuilder {
        Workflow::builder("bug")
            .state(State::new("new").named("New").with_category(StateCategory::New))
            .state(State::new("active").named("Active"))
            .state(State::new("closed").named("Closed"))
            .transition(Transition::new("new", "active").with_trigger("start"))
            .transition(Transition::new("active", "closed").with_trigger("close"))
            .transition(Transition::new("active", "active").with_trigger("reassign"))
    }

    #[test]
    fn builder_produces_workflow() {
        let workflow = bug_builder().build().unwrap();
        assert_eq!(workflow.id(), &WorkflowId::new("bug"));
        assert_eq!(workflow.state_count(), 3);
        assert_eq!(workflow.transitions().len(), 3);
        assert_eq!(workflow.state("new").unwrap().display_name(), "New");
    }

    #[test]
    fn outgoing_keeps_declaration_order() {
        let workflow = bug_builder().build().unwrap();
        let targets: Vec<&str> = workflow.outgoing("active").map(|t| t.to.as_str()).collect();
        assert_eq!(targets, vec!["closed", "active"]);
    }

    #[test]
    fn terminal_is_derived_from_edges() {
        let workflow = bug_builder().build().unwrap();
        assert!(workflow.is_terminal("closed"));
        assert!(!workflow.is_terminal("new"));
        assert!(!workflow.is_terminal("active"));
    }

    #[test]
    fn self_loop_is_allowed() {
        let workflow = bug_builder().build().unwrap();
        assert!(workflow.transitions().iter().any(Transition::is_self_loop));
    }

    #[test]
    fn rejects_duplicate_state() {
        let err = bug_builder().state(State::new("new")).build().unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateState { .. }));
    }

    #[test]
    fn rejects_undeclared_endpoint() {
        let err = bug_builder()
            .transition(Transition::new("closed", "archived"))
            .build()
            .unwrap_err();
        match err {
            ManifestError::UndeclaredState { missing, .. } => assert_eq!(missing, "archived"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_duplicate_trigger_from_same_state() {
        let err = bug_builder()
            .transition(Transition::new("active", "new").with_trigger("close"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateTrigger { .. }));
    }

    #[test]
    fn same_trigger_from_different_states_is_fine() {
        let workflow = bug_builder()
            .transition(Transition::new("new", "closed").with_trigger("close"))
            .build();
        assert!(workflow.is_ok());
    }

    #[test]
    fn rejects_duplicate_option_ids() {
        let err = bug_builder()
            .resolution_option(ChoiceOption::new("fixed", "Fixed"))
            .resolution_option(ChoiceOption::new("fixed", "Fixed again"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ManifestError::DuplicateOption { field: "resolution", .. }
        ));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(State::new("done").display_name(), "done");
    }
}
