//! Append-only transition history
//!
//! Each applied transition becomes one [`TransitionEvent`] whose hash covers
//! its content and the previous event's hash, so any edit or reordering of
//! past entries is detected by [`TransitionHistory::verify_integrity`].
//!
//! The history keeps at most `capacity` events. Evicting the oldest event
//! moves its hash into the anchor that the first retained event must link to.

use crate::error::HistoryError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use trk_manifest::{ArtifactId, StateId};
use trk_transition::Artifact;
use ulid::Ulid;

/// History event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub Ulid);

impl EventId {
    /// Generate new event ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Event id
    pub event_id: EventId,
    /// Artifact that moved
    pub artifact_id: ArtifactId,
    /// State before the move
    pub from_state: StateId,
    /// State after the move
    pub to_state: StateId,
    /// Trigger used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Reason after the move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
    /// Resolution after the move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Persisted `updated_at` of the write
    pub recorded_at: DateTime<Utc>,
    /// Hash of the preceding event (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash over this event's content and `prev_hash`
    pub hash: [u8; 32],
}

impl TransitionEvent {
    /// Hex form of the chain hash
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl std::fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {} -> {} [{}]",
            self.event_id,
            self.artifact_id,
            self.from_state,
            self.to_state,
            &self.hash_hex()[..12]
        )
    }
}

/// Default number of retained events
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Chain {
    events: VecDeque<TransitionEvent>,
    /// Hash of the last evicted event (zeros until something is evicted)
    anchor: [u8; 32],
    evicted: u64,
}

/// Bounded, hash-chained log of applied transitions
#[derive(Debug)]
pub struct TransitionHistory {
    capacity: usize,
    inner: Mutex<Chain>,
}

impl TransitionHistory {
    /// Create empty history with [`DEFAULT_HISTORY_CAPACITY`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create empty history retaining at most `capacity` events
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Chain::default()),
        }
    }

    /// Maximum retained events
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append the move from `before` to `after`
    pub fn record(&self, before: &Artifact, after: &Artifact, trigger: Option<&str>) -> EventId {
        let mut chain = self.inner.lock();
        let prev_hash = chain.events.back().map_or(chain.anchor, |e| e.hash);
        let mut event = TransitionEvent {
            event_id: EventId::new(),
            artifact_id: after.id.clone(),
            from_state: before.state.clone(),
            to_state: after.state.clone(),
            trigger: trigger.map(str::to_string),
            state_reason: after.state_reason.clone(),
            resolution: after.resolution.clone(),
            recorded_at: after.updated_at,
            prev_hash,
            hash: [0u8; 32],
        };
        event.hash = compute_hash(&event);
        let id = event.event_id;
        chain.events.push_back(event);
        while chain.events.len() > self.capacity {
            if let Some(oldest) = chain.events.pop_front() {
                chain.anchor = oldest.hash;
                chain.evicted += 1;
            }
        }
        id
    }

    /// Snapshot of retained events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.inner.lock().events.iter().cloned().collect()
    }

    /// Retained events for one artifact, oldest first
    #[must_use]
    pub fn events_for(&self, artifact_id: &str) -> Vec<TransitionEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.artifact_id == artifact_id)
            .cloned()
            .collect()
    }

    /// Number of retained events
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// Whether no events are retained
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Events dropped to stay within capacity
    #[inline]
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.inner.lock().evicted
    }

    /// Re-derive every retained hash and check the chain links
    ///
    /// # Errors
    /// `HistoryError::IntegrityViolation` at the first broken event
    pub fn verify_integrity(&self) -> Result<(), HistoryError> {
        let chain = self.inner.lock();
        let mut prev = chain.anchor;
        for (index, event) in chain.events.iter().enumerate() {
            if event.prev_hash != prev || event.hash != compute_hash(event) {
                return Err(HistoryError::IntegrityViolation { index });
            }
            prev = event.hash;
        }
        Ok(())
    }
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::new()
    }
}

fn update_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1]);
            hasher.update(v.as_bytes());
        }
        None => hasher.update([0]),
    }
    hasher.update([0]);
}

fn compute_hash(event: &TransitionEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.event_id.0.to_bytes());
    hasher.update(event.artifact_id.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(event.from_state.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(event.to_state.as_str().as_bytes());
    hasher.update([0]);
    update_optional(&mut hasher, event.trigger.as_deref());
    update_optional(&mut hasher, event.state_reason.as_deref());
    update_optional(&mut hasher, event.resolution.as_deref());
    hasher.update(event.recorded_at.timestamp_micros().to_le_bytes());
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}
