//! Transition engine
//!
//! Orchestrates one transition against the external collaborators:
//!
//! 1. Read the artifact snapshot
//! 2. Read the project's manifest (through the cache)
//! 3. Ask the policy gate for the `transition` action
//! 4. Validate the request against the snapshot
//! 5. Check the concurrency expectation and project the change
//! 6. Ask the store for an atomic, compare-and-swap guarded write
//! 7. Record the move in the history
//!
//! The engine holds no per-request state and never retries.

use crate::cache::ManifestCache;
use crate::collaborators::{ArtifactStore, ManifestSource, PolicyGate, TRANSITION_ACTION};
use crate::config::EngineConfig;
use crate::error::{EngineError, ResultCode, StoreError};
use crate::history::TransitionHistory;
use crate::policy::AllowedActionsPolicy;
use std::sync::Arc;
use trk_manifest::{ArtifactId, ManifestBundle, ProjectId};
use trk_transition::{
    apply, permitted_transitions, ApplyError, Artifact, PermittedTransition, TransitionCommand,
    TransitionRequest, TransitionValidator,
};

/// Which `updated_at` guards the store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteGuard {
    /// The caller's expectation (`None` overwrites)
    Caller,
    /// The snapshot the request was validated against
    Snapshot,
}

/// Single-transition engine
pub struct TransitionEngine {
    config: EngineConfig,
    store: Arc<dyn ArtifactStore>,
    manifests: Arc<dyn ManifestSource>,
    cache: ManifestCache,
    policy: Arc<dyn PolicyGate>,
    validator: TransitionValidator,
    history: Arc<TransitionHistory>,
}

impl std::fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("config", &self.config)
            .field("validator", &self.validator)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl TransitionEngine {
    /// Start building an engine over a store and a manifest source
    #[must_use]
    pub fn builder(
        store: Arc<dyn ArtifactStore>,
        manifests: Arc<dyn ManifestSource>,
    ) -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            store,
            manifests,
            policy: None,
            history: None,
        }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transition history shared with this engine
    #[inline]
    #[must_use]
    pub fn history(&self) -> &Arc<TransitionHistory> {
        &self.history
    }

    /// Manifest cache
    #[inline]
    #[must_use]
    pub fn manifest_cache(&self) -> &ManifestCache {
        &self.cache
    }

    /// Legal moves for an artifact's current type and state
    ///
    /// # Errors
    /// Missing artifact, unavailable manifest, or store failure
    pub async fn permitted_transitions(
        &self,
        id: &ArtifactId,
    ) -> Result<Vec<PermittedTransition>, EngineError> {
        let artifact = self.load_artifact(id).await?;
        let bundle = self.manifest(&artifact.project).await?;
        Ok(permitted_transitions(
            &bundle,
            artifact.artifact_type.as_str(),
            artifact.state.as_str(),
        ))
    }

    /// Validate and apply one transition
    ///
    /// The write is guarded by `request.expected_updated_at`; `None` overwrites.
    ///
    /// # Errors
    /// `Validation`, `Conflict` (carrying the stored artifact), `PolicyDenied`,
    /// or a collaborator failure
    pub async fn transition(
        &self,
        id: &ArtifactId,
        request: &TransitionRequest,
    ) -> Result<Artifact, EngineError> {
        self.execute(id, request, WriteGuard::Caller).await
    }

    /// Validate and apply a command addressed to its own artifact
    ///
    /// # Errors
    /// As [`TransitionEngine::transition`]
    pub async fn submit(&self, command: &TransitionCommand) -> Result<Artifact, EngineError> {
        self.transition(&command.artifact_id, &command.request).await
    }

    pub(crate) async fn execute(
        &self,
        id: &ArtifactId,
        request: &TransitionRequest,
        guard: WriteGuard,
    ) -> Result<Artifact, EngineError> {
        let outcome = self.run(id, request, guard).await;
        let code = match &outcome {
            Ok(_) => ResultCode::Ok,
            Err(err) => err.result_code(),
        };
        metrics::counter!("trk_transitions_total", "result" => code.as_str()).increment(1);
        outcome
    }

    async fn run(
        &self,
        id: &ArtifactId,
        request: &TransitionRequest,
        guard: WriteGuard,
    ) -> Result<Artifact, EngineError> {
        let artifact = self.load_artifact(id).await?;
        let bundle = self.manifest(&artifact.project).await?;

        if let Err(denied) = self.policy.authorize(&artifact, TRANSITION_ACTION).await {
            tracing::debug!("Policy denied transition of {}: {}", id, denied);
            return Err(denied.into());
        }

        let mut command = match self.validator.validate(&bundle, &artifact, request) {
            Ok(command) => command,
            Err(rejection) => {
                tracing::debug!("Rejected transition of {}: {}", id, rejection);
                return Err(rejection.into());
            }
        };
        if guard == WriteGuard::Snapshot {
            command.expected_updated_at = Some(artifact.updated_at);
        }

        apply(&artifact, &command).map_err(|err| conflict_from_apply(err, &artifact))?;

        let updated = self
            .store
            .update_state(id, &command.state_change(), command.expected_updated_at)
            .await
            .map_err(|err| from_store_error(id, err))?;

        self.history
            .record(&artifact, &updated, command.trigger.as_deref());
        tracing::info!("Transitioned {}: {} -> {}", id, artifact.state, updated.state);
        Ok(updated)
    }

    async fn load_artifact(&self, id: &ArtifactId) -> Result<Artifact, EngineError> {
        self.store.get(id).await.map_err(|err| from_store_error(id, err))
    }

    async fn manifest(&self, project: &ProjectId) -> Result<Arc<ManifestBundle>, EngineError> {
        self.cache
            .get_or_load(project, self.manifests.as_ref())
            .await
            .map_err(|err| {
                tracing::warn!("Manifest unavailable for project {}: {}", project, err);
                EngineError::ManifestUnavailable {
                    project: project.clone(),
                    reason: err.to_string(),
                }
            })
    }
}

fn from_store_error(id: &ArtifactId, err: StoreError) -> EngineError {
    match err {
        StoreError::NotFound(_) => EngineError::NotFound(id.clone()),
        StoreError::Conflict { current } => {
            tracing::warn!("Concurrent modification of {} detected at write", id);
            EngineError::Conflict {
                detail: format!(
                    "Artifact {id} was modified at {} by someone else. Reload it or overwrite.",
                    current.updated_at
                ),
                current,
            }
        }
        StoreError::Backend(_) => EngineError::Store(err),
    }
}

fn conflict_from_apply(err: ApplyError, artifact: &Artifact) -> EngineError {
    match err {
        ApplyError::Conflict { .. } => {
            tracing::warn!("Stale expectation for {}", artifact.id);
            EngineError::Conflict {
                detail: err.to_string(),
                current: Box::new(artifact.clone()),
            }
        }
        ApplyError::Validation(rejection) => EngineError::Validation(rejection),
    }
}

/// Builder for [`TransitionEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    store: Arc<dyn ArtifactStore>,
    manifests: Arc<dyn ManifestSource>,
    policy: Option<Arc<dyn PolicyGate>>,
    history: Option<Arc<TransitionHistory>>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// With configuration
    #[inline]
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// With policy gate (default: [`AllowedActionsPolicy`])
    #[inline]
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn PolicyGate>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// With a shared history
    #[inline]
    #[must_use]
    pub fn history(mut self, history: Arc<TransitionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Build the engine
    ///
    /// Without a shared history the engine keeps its own, bounded by
    /// `config.history_capacity`.
    #[must_use]
    pub fn build(self) -> TransitionEngine {
        let capacity = self.config.history_capacity;
        TransitionEngine {
            cache: ManifestCache::from_config(&self.config),
            validator: TransitionValidator::new()
                .with_strict_option_ids(self.config.strict_option_ids),
            config: self.config,
            store: self.store,
            manifests: self.manifests,
            policy: self.policy.unwrap_or_else(|| Arc::new(AllowedActionsPolicy)),
            history: self
                .history
                .unwrap_or_else(|| Arc::new(TransitionHistory::with_capacity(capacity))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockPolicyGate, StaticManifestSource};
    use crate::error::PolicyDenied;
    use crate::store::InMemoryArtifactStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use trk_manifest::{ArtifactTypeDef, ChoiceOption, State, Transition, Workflow};

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn bundle() -> ManifestBundle {
        let workflow = Workflow::builder("bug")
            .state(State::new("new").named("New"))
            .state(State::new("active").named("Active"))
            .state(State::new("closed").named("Closed"))
            .transition(Transition::new("new", "active").with_trigger("start"))
            .transition(Transition::new("active", "closed").with_trigger("close"))
            .resolution_option(ChoiceOption::new("fixed", "Fixed"))
            .build()
            .unwrap();
        ManifestBundle::new(
            [workflow],
            [ArtifactTypeDef::new("bug").with_workflow("bug")],
        )
        .unwrap()
    }

    fn setup() -> (Arc<InMemoryArtifactStore>, TransitionEngine) {
        let store = Arc::new(InMemoryArtifactStore::from_artifacts([
            Artifact::new("BUG-1", "bug", "new", stamp()),
            Artifact::new("BUG-2", "bug", "active", stamp()),
        ]));
        let manifests = Arc::new(StaticManifestSource::single(ProjectId::default(), bundle()));
        let engine = TransitionEngine::builder(store.clone(), manifests).build();
        (store, engine)
    }

    #[tokio::test]
    async fn permitted_reflects_current_state() {
        let (_, engine) = setup();
        let permitted = engine
            .permitted_transitions(&ArtifactId::new("BUG-1"))
            .await
            .unwrap();
        assert_eq!(permitted.len(), 1);
        assert_eq!(permitted[0].trigger.as_deref(), Some("start"));
    }

    #[tokio::test]
    async fn transition_writes_and_records() {
        let (store, engine) = setup();
        let id = ArtifactId::new("BUG-1");
        let updated = engine
            .transition(&id, &TransitionRequest::trigger("start").expecting(stamp()))
            .await
            .unwrap();

        assert_eq!(updated.state, "active");
        assert_eq!(store.snapshot("BUG-1").unwrap().state, "active");
        assert_eq!(engine.history().len(), 1);
        assert!(engine.history().verify_integrity().is_ok());
    }

    #[tokio::test]
    async fn submitted_command_targets_its_artifact() {
        let (store, engine) = setup();
        let command = TransitionCommand::new(
            "BUG-2",
            TransitionRequest::to_state("closed").with_resolution("fixed"),
        );
        let updated = engine.submit(&command).await.unwrap();

        assert_eq!(updated.id, "BUG-2");
        assert_eq!(store.snapshot("BUG-2").unwrap().state, "closed");
        assert_eq!(store.snapshot("BUG-1").unwrap().state, "new");
    }

    #[tokio::test]
    async fn stale_expectation_conflicts_then_overwrite_succeeds() {
        let (store, engine) = setup();
        let id = ArtifactId::new("BUG-1");
        let stale = TransitionRequest::trigger("start").expecting(stamp() - Duration::minutes(5));

        let err = engine.transition(&id, &stale).await.unwrap_err();
        assert_eq!(err.result_code(), ResultCode::ConflictError);
        assert_eq!(err.current_artifact().unwrap().state, "new");
        assert_eq!(store.snapshot("BUG-1").unwrap().state, "new");

        let updated = engine.transition(&id, &stale.overwrite()).await.unwrap();
        assert_eq!(updated.state, "active");
    }

    #[tokio::test]
    async fn closing_requires_resolution() {
        let (_, engine) = setup();
        let id = ArtifactId::new("BUG-2");

        let err = engine
            .transition(&id, &TransitionRequest::trigger("close"))
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), ResultCode::ValidationError);

        let closed = engine
            .transition(&id, &TransitionRequest::trigger("close").with_resolution("fixed"))
            .await
            .unwrap();
        assert_eq!(closed.resolution.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn policy_denial_stops_before_write() {
        let store = Arc::new(InMemoryArtifactStore::from_artifacts([Artifact::new(
            "BUG-1",
            "bug",
            "new",
            stamp(),
        )]));
        let manifests = Arc::new(StaticManifestSource::single(ProjectId::default(), bundle()));
        let mut policy = MockPolicyGate::new();
        policy
            .expect_authorize()
            .times(1)
            .returning(|_, _| Err(PolicyDenied("Not today.".to_string())));
        let engine = TransitionEngine::builder(store.clone(), manifests)
            .policy(Arc::new(policy))
            .build();

        let err = engine
            .transition(&ArtifactId::new("BUG-1"), &TransitionRequest::trigger("start"))
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), ResultCode::PolicyDenied);
        assert_eq!(store.snapshot("BUG-1").unwrap().state, "new");
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn unknown_project_is_unavailable() {
        let stray = Artifact::new("BUG-9", "bug", "new", stamp()).in_project("elsewhere");
        let store = Arc::new(InMemoryArtifactStore::from_artifacts([stray]));
        let manifests = Arc::new(StaticManifestSource::single(ProjectId::default(), bundle()));
        let engine = TransitionEngine::builder(store, manifests).build();

        let err = engine
            .permitted_transitions(&ArtifactId::new("BUG-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ManifestUnavailable { .. }));
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let (_, engine) = setup();
        let err = engine
            .transition(&ArtifactId::new("BUG-404"), &TransitionRequest::trigger("start"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
