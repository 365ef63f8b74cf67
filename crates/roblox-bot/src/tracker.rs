//! In-flight key tracking: deduplication and cooldown per logical request.
//!
//! One record per dedupe key, holding the instant of its last admission.
//! `admit` and `release` take the same lock, so two arrivals for the same
//! key are decided in the order they reach the tracker.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Which identities make two invocations "the same request".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeScope {
    /// Channel + requester + target.
    #[default]
    Requester,
    /// Channel + target, regardless of who asked.
    Channel,
}

/// When an admitted key becomes available again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Free the key as soon as the invocation ends.
    #[default]
    OnCompletion,
    /// Keep the record until the cooldown window elapses.
    AfterCooldown,
}

/// Composite identity of one logical lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub surface_id: u64,
    pub requester_id: Option<u64>,
    /// Trimmed and lowercased account name.
    pub target: String,
}

impl DedupeKey {
    pub fn new(scope: DedupeScope, surface_id: u64, requester_id: u64, target: &str) -> Self {
        let requester_id = match scope {
            DedupeScope::Requester => Some(requester_id),
            DedupeScope::Channel => None,
        };
        Self {
            surface_id,
            requester_id,
            target: target.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Whole seconds left in the window, never less than 1.
    Rejected { remaining_secs: u64 },
}

/// Process-wide map of cooling-down keys.
#[derive(Default)]
pub struct InFlightTracker {
    records: Mutex<HashMap<DedupeKey, Instant>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `key` at `now` unless it was admitted less than `cooldown` ago.
    ///
    /// Records whose window has elapsed are pruned on the way.
    pub fn admit(&self, key: &DedupeKey, now: Instant, cooldown: Duration) -> Admission {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.retain(|_, admitted_at| now.saturating_duration_since(*admitted_at) < cooldown);

        if let Some(admitted_at) = records.get(key) {
            let elapsed = now.saturating_duration_since(*admitted_at);
            let remaining_secs = cooldown.saturating_sub(elapsed).as_secs().max(1);
            debug!("Rejected {:?}: {}s of cooldown left", key, remaining_secs);
            return Admission::Rejected { remaining_secs };
        }

        records.insert(key.clone(), now);
        Admission::Admitted
    }

    /// Remove the record for `key`, whatever state it is in.
    pub fn release(&self, key: &DedupeKey) {
        let removed = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            debug!("Released {:?}", key);
        }
    }

    /// Number of keys currently tracked (including ones whose window has
    /// elapsed but that have not been pruned yet).
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its key according to the policy when dropped, including
/// during unwinding.
pub struct AdmissionGuard<'a> {
    tracker: &'a InFlightTracker,
    key: DedupeKey,
    policy: ReleasePolicy,
}

impl<'a> AdmissionGuard<'a> {
    pub fn new(tracker: &'a InFlightTracker, key: DedupeKey, policy: ReleasePolicy) -> Self {
        Self {
            tracker,
            key,
            policy,
        }
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if self.policy == ReleasePolicy::OnCompletion {
            self.tracker.release(&self.key);
        }
    }
}
