//! Transition validator
//!
//! Decides whether a request is admissible for an artifact snapshot and turns
//! it into a [`NormalizedCommand`] with a concrete destination.
//!
//! # Order of checks
//! 1. Resolve permitted transitions for the artifact's type and state
//! 2. Trigger, if given, must match a permitted entry (trigger wins over `new_state`);
//!    empty strings count as not given
//! 3. Otherwise `new_state` must be a permitted destination
//! 4. Otherwise the request has no target
//! 5. Destinations that look terminal require a resolution
//! 6. Option ids are checked against the workflow (strict mode)

use crate::artifact::{Artifact, FieldUpdate};
use crate::command::{NormalizedCommand, TransitionRequest};
use crate::error::{Rejection, RejectionCode};
use crate::resolver::{find_by_state, find_by_trigger, permitted_transitions};
use trk_manifest::{ChoiceOption, ManifestBundle, State, StateId, Workflow};

/// State names (lower-cased) that require a resolution when the workflow
/// declares resolution options
pub const RESOLUTION_STATE_NAMES: [&str; 3] = ["resolved", "closed", "done"];

/// Validator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionValidator {
    strict_option_ids: bool,
}

impl TransitionValidator {
    /// Strict validator: option ids must be declared
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            strict_option_ids: true,
        }
    }

    /// Lenient validator: any option value is accepted
    #[inline]
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict_option_ids: false,
        }
    }

    /// Toggle option-id checking
    #[inline]
    #[must_use]
    pub fn with_strict_option_ids(mut self, strict: bool) -> Self {
        self.strict_option_ids = strict;
        self
    }

    /// Whether option ids are checked
    #[inline]
    #[must_use]
    pub fn strict_option_ids(&self) -> bool {
        self.strict_option_ids
    }

    /// Validate `request` against `artifact`'s current type and state
    ///
    /// # Errors
    /// A [`Rejection`] describing the first failed check
    pub fn validate(
        &self,
        bundle: &ManifestBundle,
        artifact: &Artifact,
        request: &TransitionRequest,
    ) -> Result<NormalizedCommand, Rejection> {
        let permitted = permitted_transitions(
            bundle,
            artifact.artifact_type.as_str(),
            artifact.state.as_str(),
        );

        let requested_trigger = request.trigger.as_deref().filter(|t| !t.is_empty());
        let requested_state = request
            .new_state
            .as_ref()
            .filter(|s| !s.as_str().is_empty());

        let (to_state, trigger) = if let Some(trigger) = requested_trigger {
            let entry = find_by_trigger(&permitted, trigger).ok_or_else(|| {
                Rejection::new(
                    RejectionCode::TriggerNotPermitted,
                    format!(
                        "Trigger '{trigger}' is not permitted from state '{}'.",
                        artifact.state
                    ),
                )
            })?;
            if let Some(requested) = requested_state {
                if *requested != entry.to_state {
                    tracing::debug!(
                        "Trigger {} resolves to {}, ignoring new_state {}",
                        trigger,
                        entry.to_state,
                        requested
                    );
                }
            }
            (entry.to_state.clone(), Some(trigger.to_string()))
        } else if let Some(new_state) = requested_state {
            let entry = find_by_state(&permitted, new_state.as_str()).ok_or_else(|| {
                Rejection::new(
                    RejectionCode::StateNotPermitted,
                    format!(
                        "Cannot move from state '{}' to state '{new_state}'.",
                        artifact.state
                    ),
                )
            })?;
            (entry.to_state.clone(), None)
        } else {
            return Err(Rejection::new(
                RejectionCode::NoTarget,
                "No target specified: provide a trigger or a new state.",
            ));
        };

        let state_reason = FieldUpdate::from_request(request.state_reason.as_deref());
        let resolution = FieldUpdate::from_request(request.resolution.as_deref());

        // A permitted entry implies the workflow exists.
        if let Some(workflow) = bundle.workflow_for(artifact.artifact_type.as_str()) {
            if requires_resolution(workflow, &to_state) && resolution.value().is_none() {
                return Err(Rejection::new(
                    RejectionCode::ResolutionRequired,
                    format!(
                        "A resolution is required to move to '{}'.",
                        display(workflow, &to_state)
                    ),
                ));
            }
            if self.strict_option_ids {
                check_option(
                    &state_reason,
                    workflow.state_reason_options(),
                    RejectionCode::UnknownStateReason,
                    "state reason",
                )?;
                check_option(
                    &resolution,
                    workflow.resolution_options(),
                    RejectionCode::UnknownResolution,
                    "resolution",
                )?;
            }
        }

        Ok(NormalizedCommand {
            to_state,
            trigger,
            state_reason,
            resolution,
            expected_updated_at: request.expected_updated_at,
        })
    }
}

impl Default for TransitionValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether entering `state` requires a resolution
///
/// Only workflows that declare resolution options can require one. A state's
/// explicit `requires_resolution` flag wins; otherwise its display name is
/// matched against [`RESOLUTION_STATE_NAMES`].
#[must_use]
pub fn requires_resolution(workflow: &Workflow, state: &StateId) -> bool {
    if !workflow.has_resolution_options() {
        return false;
    }
    match workflow.state(state.as_str()) {
        Some(State {
            requires_resolution: Some(flag),
            ..
        }) => *flag,
        Some(s) => is_resolution_name(s.display_name()),
        None => is_resolution_name(state.as_str()),
    }
}

fn is_resolution_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    RESOLUTION_STATE_NAMES.contains(&lowered.as_str())
}

fn display<'a>(workflow: &'a Workflow, state: &'a StateId) -> &'a str {
    workflow
        .state(state.as_str())
        .map_or(state.as_str(), State::display_name)
}

fn check_option(
    update: &FieldUpdate,
    options: &[ChoiceOption],
    code: RejectionCode,
    field: &str,
) -> Result<(), Rejection> {
    let Some(value) = update.value() else {
        return Ok(());
    };
    if options.is_empty() || options.iter().any(|o| o.id == value) {
        return Ok(());
    }
    Err(Rejection::new(
        code,
        format!("'{value}' is not a valid {field} for this workflow."),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trk_manifest::{ArtifactTypeDef, Transition};

    fn bundle() -> ManifestBundle {
        let bug = Workflow::builder("bug")
            .state(State::new("new").named("New"))
            .state(State::new("active").named("Active"))
            .state(State::new("resolved").named("Resolved"))
            .state(State::new("closed").named("Closed"))
            .state(State::new("wontfix").named("Won't fix").with_requires_resolution(true))
            .state(State::new("done").named("Done").with_requires_resolution(false))
            .transition(Transition::new("new", "active").with_trigger("start"))
            .transition(Transition::new("active", "resolved").with_trigger("resolve"))
            .transition(Transition::new("active", "closed").with_trigger("close"))
            .transition(Transition::new("active", "wontfix"))
            .transition(Transition::new("active", "done"))
            .transition(Transition::new("active", "active").with_trigger("touch"))
            .state_reason_option(ChoiceOption::new("triaged", "Triaged"))
            .resolution_option(ChoiceOption::new("fixed", "Fixed"))
            .build()
            .unwrap();
        let task = Workflow::builder("task")
            .state(State::new("todo"))
            .state(State::new("done").named("Done"))
            .transition(Transition::new("todo", "done").with_trigger("finish"))
            .build()
            .unwrap();
        ManifestBundle::new(
            [bug, task],
            [
                ArtifactTypeDef::new("bug").with_workflow("bug"),
                ArtifactTypeDef::new("task").with_workflow("task"),
                ArtifactTypeDef::new("note"),
            ],
        )
        .unwrap()
    }

    fn artifact(kind: &str, state: &str) -> Artifact {
        Artifact::new("A-1", kind, state, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn code(result: Result<NormalizedCommand, Rejection>) -> RejectionCode {
        result.unwrap_err().code
    }

    #[test]
    fn trigger_resolves_destination() {
        let cmd = TransitionValidator::new()
            .validate(&bundle(), &artifact("bug", "new"), &TransitionRequest::trigger("start"))
            .unwrap();
        assert_eq!(cmd.to_state, "active");
        assert_eq!(cmd.trigger.as_deref(), Some("start"));
    }

    #[test]
    fn trigger_wins_over_new_state() {
        let mut request = TransitionRequest::trigger("touch");
        request.new_state = Some(StateId::new("done"));
        let cmd = TransitionValidator::new()
            .validate(&bundle(), &artifact("bug", "active"), &request)
            .unwrap();
        assert_eq!(cmd.to_state, "active");
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        let result = TransitionValidator::new().validate(
            &bundle(),
            &artifact("bug", "new"),
            &TransitionRequest::trigger("close"),
        );
        assert_eq!(code(result), RejectionCode::TriggerNotPermitted);
    }

    #[test]
    fn unreachable_state_is_rejected() {
        let result = TransitionValidator::new().validate(
            &bundle(),
            &artifact("bug", "new"),
            &TransitionRequest::to_state("closed"),
        );
        assert_eq!(code(result), RejectionCode::StateNotPermitted);
    }

    #[test]
    fn missing_target_is_rejected() {
        let result = TransitionValidator::new().validate(
            &bundle(),
            &artifact("bug", "new"),
            &TransitionRequest::default(),
        );
        assert_eq!(code(result), RejectionCode::NoTarget);
    }

    #[test]
    fn empty_trigger_falls_back_to_new_state() {
        let request = TransitionRequest {
            trigger: Some(String::new()),
            new_state: Some(StateId::new("active")),
            ..TransitionRequest::default()
        };
        let cmd = TransitionValidator::new()
            .validate(&bundle(), &artifact("bug", "new"), &request)
            .unwrap();
        assert_eq!(cmd.to_state, "active");
        assert_eq!(cmd.trigger, None);
    }

    #[test]
    fn blank_trigger_and_state_have_no_target() {
        let request = TransitionRequest {
            trigger: Some(String::new()),
            new_state: Some(StateId::new("")),
            ..TransitionRequest::default()
        };
        let result =
            TransitionValidator::new().validate(&bundle(), &artifact("bug", "new"), &request);
        assert_eq!(code(result), RejectionCode::NoTarget);
    }

    #[test]
    fn resolution_required_by_name() {
        let v = TransitionValidator::new();
        let b = bundle();
        let a = artifact("bug", "active");

        for trigger in ["resolve", "close"] {
            let result = v.validate(&b, &a, &TransitionRequest::trigger(trigger));
            assert_eq!(code(result), RejectionCode::ResolutionRequired);

            let ok = v.validate(
                &b,
                &a,
                &TransitionRequest::trigger(trigger).with_resolution("fixed"),
            );
            assert!(ok.is_ok());
        }
    }

    #[test]
    fn empty_resolution_does_not_satisfy_requirement() {
        let result = TransitionValidator::new().validate(
            &bundle(),
            &artifact("bug", "active"),
            &TransitionRequest::trigger("close").with_resolution(""),
        );
        assert_eq!(code(result), RejectionCode::ResolutionRequired);
    }

    #[test]
    fn explicit_flag_overrides_name() {
        let v = TransitionValidator::new();
        let b = bundle();
        let a = artifact("bug", "active");

        let wontfix = v.validate(&b, &a, &TransitionRequest::to_state("wontfix"));
        assert_eq!(code(wontfix), RejectionCode::ResolutionRequired);

        let done = v.validate(&b, &a, &TransitionRequest::to_state("done"));
        assert!(done.is_ok());
    }

    #[test]
    fn no_resolution_options_means_no_requirement() {
        let cmd = TransitionValidator::new()
            .validate(&bundle(), &artifact("task", "todo"), &TransitionRequest::trigger("finish"))
            .unwrap();
        assert_eq!(cmd.to_state, "done");
        assert_eq!(cmd.resolution, FieldUpdate::Keep);
    }

    #[test]
    fn strict_mode_rejects_unknown_options() {
        let b = bundle();
        let a = artifact("bug", "active");
        let request = TransitionRequest::trigger("close").with_resolution("lost");

        let strict = TransitionValidator::new().validate(&b, &a, &request);
        assert_eq!(code(strict), RejectionCode::UnknownResolution);

        let lenient = TransitionValidator::lenient().validate(&b, &a, &request);
        assert!(lenient.is_ok());

        let reason = TransitionValidator::new().validate(
            &b,
            &a,
            &TransitionRequest::trigger("touch").with_state_reason("bored"),
        );
        assert_eq!(code(reason), RejectionCode::UnknownStateReason);
    }

    #[test]
    fn clearing_is_always_allowed() {
        let cmd = TransitionValidator::new()
            .validate(
                &bundle(),
                &artifact("bug", "active"),
                &TransitionRequest::trigger("touch").with_state_reason(""),
            )
            .unwrap();
        assert_eq!(cmd.state_reason, FieldUpdate::Clear);
    }

    #[test]
    fn type_without_workflow_rejects_everything() {
        let result = TransitionValidator::new().validate(
            &bundle(),
            &artifact("note", "open"),
            &TransitionRequest::to_state("open"),
        );
        assert_eq!(code(result), RejectionCode::StateNotPermitted);
    }

    #[test]
    fn expectation_is_carried_through() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let cmd = TransitionValidator::new()
            .validate(
                &bundle(),
                &artifact("bug", "new"),
                &TransitionRequest::trigger("start").expecting(when),
            )
            .unwrap();
        assert_eq!(cmd.expected_updated_at, Some(when));
    }
}
