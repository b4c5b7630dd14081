//! Batch transition coordinator
//!
//! Fans one request out over a set of artifacts. Each item runs the full
//! single-transition path on its own; a failure on one item never aborts,
//! blocks or rolls back another. Items run on a bounded number of concurrent
//! futures, and the aggregate is the same whatever order they finish in.

use crate::engine::{TransitionEngine, WriteGuard};
use crate::error::{EngineError, ResultCode};
use futures::{stream, FutureExt, StreamExt};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use trk_manifest::ArtifactId;
use trk_transition::{common_triggers, Artifact, CommonTrigger, TransitionRequest};

/// Aggregate outcome of one batch call
///
/// `results` holds exactly one entry per distinct input id. `errors` holds one
/// `"{id}: {message}"` line per failed item in completion order; treat it as
/// unordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Items that transitioned
    pub success_count: usize,
    /// Items that failed
    pub error_count: usize,
    /// Human-readable failure lines
    pub errors: Vec<String>,
    /// Outcome code per artifact
    pub results: BTreeMap<ArtifactId, ResultCode>,
}

impl BatchResult {
    fn record(&mut self, id: ArtifactId, outcome: &Result<Artifact, EngineError>) {
        match outcome {
            Ok(_) => {
                self.success_count += 1;
                self.results.insert(id, ResultCode::Ok);
            }
            Err(err) => {
                self.error_count += 1;
                self.errors.push(format!("{id}: {}", err.user_message()));
                self.results.insert(id, err.result_code());
            }
        }
    }

    /// Number of items processed
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Whether every item succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    /// Outcome for one artifact
    #[inline]
    #[must_use]
    pub fn result_for(&self, id: &str) -> Option<ResultCode> {
        self.results.get(id).copied()
    }

    /// Failure message for one artifact, with the `"{id}: "` prefix stripped
    #[must_use]
    pub fn message_for(&self, id: &str) -> Option<&str> {
        self.errors.iter().find_map(|line| {
            line.strip_prefix(id)
                .and_then(|rest| rest.strip_prefix(": "))
        })
    }

    /// Ids whose outcome is `code`, sorted
    #[must_use]
    pub fn ids_with(&self, code: ResultCode) -> Vec<&ArtifactId> {
        self.results
            .iter()
            .filter(|(_, c)| **c == code)
            .map(|(id, _)| id)
            .collect()
    }

    /// One-line summary, e.g. `"7 of 10 transitioned, 3 failed (conflict_error: 3)"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} of {} transitioned, {} failed",
            self.success_count,
            self.total(),
            self.error_count
        );
        let mut by_code: BTreeMap<ResultCode, usize> = BTreeMap::new();
        for code in self.results.values().filter(|c| **c != ResultCode::Ok) {
            *by_code.entry(*code).or_default() += 1;
        }
        if !by_code.is_empty() {
            let parts: Vec<String> = by_code
                .iter()
                .map(|(code, count)| format!("{code}: {count}"))
                .collect();
            line.push_str(&format!(" ({})", parts.join(", ")));
        }
        line
    }
}

/// Fans transitions out over many artifacts
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    engine: Arc<TransitionEngine>,
}

impl BatchCoordinator {
    /// Create coordinator over a shared engine
    #[inline]
    #[must_use]
    pub fn new(engine: Arc<TransitionEngine>) -> Self {
        Self { engine }
    }

    /// Underlying engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &Arc<TransitionEngine> {
        &self.engine
    }

    /// Apply `request` to every distinct id
    ///
    /// Any caller expectation on `request` is ignored: each item's write is
    /// guarded by the `updated_at` of the snapshot it was validated against.
    /// Duplicate ids are processed once. Successful items stay applied
    /// whatever happens to the others.
    pub async fn apply_batch(
        &self,
        ids: &[ArtifactId],
        request: &TransitionRequest,
    ) -> BatchResult {
        let unique: IndexSet<&ArtifactId> = ids.iter().collect();
        let request = request.clone().overwrite();
        let concurrency = self.engine.config().batch_concurrency.max(1);
        tracing::info!(
            "Batch transition over {} artifacts (concurrency {})",
            unique.len(),
            concurrency
        );

        let outcomes: Vec<(ArtifactId, Result<Artifact, EngineError>)> =
            stream::iter(unique.into_iter().map(|id| {
                let engine = &self.engine;
                let request = &request;
                async move {
                    let outcome =
                        AssertUnwindSafe(engine.execute(id, request, WriteGuard::Snapshot))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|payload| {
                                let message = panic_message(payload.as_ref());
                                tracing::error!("Transition of {} panicked: {}", id, message);
                                Err(EngineError::Internal(message))
                            });
                    (id.clone(), outcome)
                }
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut result = BatchResult::default();
        for (id, outcome) in outcomes {
            result.record(id, &outcome);
        }
        metrics::counter!("trk_batches_total").increment(1);
        tracing::info!("Batch finished: {}", result.summary());
        result
    }

    /// Triggers offered for every artifact in a selection
    ///
    /// Only the first `prefetch_limit` distinct ids are consulted. Any failed
    /// lookup, or an empty selection, yields no triggers.
    pub async fn common_triggers(&self, ids: &[ArtifactId]) -> Vec<CommonTrigger> {
        let unique: IndexSet<&ArtifactId> = ids.iter().collect();
        let limit = self.engine.config().prefetch_limit;
        if unique.len() > limit {
            tracing::debug!(
                "Common triggers consider {} of {} selected artifacts",
                limit,
                unique.len()
            );
        }
        let concurrency = self.engine.config().batch_concurrency.max(1);

        let lists: Vec<_> = stream::iter(unique.into_iter().take(limit).map(|id| {
            let engine = &self.engine;
            async move {
                match engine.permitted_transitions(id).await {
                    Ok(list) => Some(list),
                    Err(err) => {
                        tracing::debug!("Permitted lookup failed for {}: {}", id, err);
                        None
                    }
                }
            }
        }))
        .buffered(concurrency)
        .collect()
        .await;

        common_triggers(&lists)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic while processing artifact".to_string()
    }
}
