//! Call aggregator: runs a [`RemoteCallPlan`] against a gateway.
//!
//! Calls whose dependencies have all succeeded run concurrently on a
//! `FuturesUnordered`; a call whose dependency failed or was skipped is
//! recorded as `Skipped` without being attempted. A failing branch never
//! aborts independent ones.

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod aggregator_tests;

use std::collections::BTreeMap;

use futures_util::stream::{FuturesUnordered, StreamExt};
use roblox_client::DirectoryGateway;
use roblox_types::{CallFailure, CallName, CallPayload, CallRequest, ResolvedAccount};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::plan::{PlannedCall, RemoteCallPlan};

/// Outcome of one named call within a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Succeeded(CallPayload),
    Failed(CallFailure),
    /// Not attempted because `cause`, a direct dependency, did not succeed.
    Skipped { cause: CallName },
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Collected per-call outcomes of one plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateResult {
    pub target: String,
    /// Set once `resolve-account-by-name` succeeds.
    pub account: Option<ResolvedAccount>,
    pub outcomes: BTreeMap<CallName, CallOutcome>,
}

impl AggregateResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn outcome(&self, name: CallName) -> Option<&CallOutcome> {
        self.outcomes.get(&name)
    }

    pub fn payload(&self, name: CallName) -> Option<&CallPayload> {
        match self.outcomes.get(&name) {
            Some(CallOutcome::Succeeded(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Failure of the name resolution, if it was attempted and failed.
    pub fn resolve_failure(&self) -> Option<&CallFailure> {
        match self.outcomes.get(&CallName::ResolveAccount) {
            Some(CallOutcome::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    /// Calls that failed or were skipped, in catalog order.
    pub fn unavailable(&self) -> Vec<CallName> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.values().all(CallOutcome::is_success)
    }
}

/// Retry policy for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
        }
    }

    /// Backoff before attempt `attempt + 1`, doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    250
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("call {0} became ready without a resolved account")]
    MissingInput(CallName),
}

enum Readiness {
    Ready,
    Blocked,
    Skip(CallName),
}

#[derive(Debug, Clone, Default)]
pub struct CallAggregator {
    retry: RetryPolicy,
}

impl CallAggregator {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub async fn run<G: DirectoryGateway>(
        &self,
        plan: &RemoteCallPlan,
        gateway: &G,
    ) -> Result<AggregateResult, AggregateError> {
        let mut result = AggregateResult::new(plan.target());
        let mut pending: Vec<&PlannedCall> = plan.calls().iter().collect();
        let mut in_flight = FuturesUnordered::new();

        loop {
            // Skips cascade, so sweep until a pass changes nothing.
            let mut changed = true;
            while changed {
                changed = false;
                let mut blocked = Vec::with_capacity(pending.len());
                for call in pending.drain(..) {
                    match readiness(call, &result.outcomes) {
                        Readiness::Blocked => blocked.push(call),
                        Readiness::Skip(cause) => {
                            debug!("Skipping {}: dependency {} did not succeed", call.name, cause);
                            result
                                .outcomes
                                .insert(call.name, CallOutcome::Skipped { cause });
                            changed = true;
                        }
                        Readiness::Ready => {
                            let request = build_request(call.name, plan, result.account.as_ref())?;
                            debug!("Scheduling {}", call.name);
                            in_flight.push(self.call_with_retry(gateway, request));
                        }
                    }
                }
                pending = blocked;
            }

            let Some((name, outcome)) = in_flight.next().await else {
                break;
            };
            if let CallOutcome::Succeeded(payload) = &outcome {
                if let Some(account) = payload.as_account() {
                    result.account = Some(account.clone());
                }
            }
            result.outcomes.insert(name, outcome);
        }

        Ok(result)
    }

    async fn call_with_retry<G: DirectoryGateway>(
        &self,
        gateway: &G,
        request: CallRequest,
    ) -> (CallName, CallOutcome) {
        let name = request.name();
        let mut attempt = 1u32;

        loop {
            match gateway.call(&request).await {
                Ok(payload) => {
                    debug!("{} succeeded (attempt {})", name, attempt);
                    return (name, CallOutcome::Succeeded(payload));
                }
                Err(failure)
                    if failure.kind.is_retryable() && attempt < self.retry.max_attempts =>
                {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        "{} failed (attempt {}): {}. Retrying in {:?}",
                        name, attempt, failure, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(failure) => {
                    warn!(call = %name, kind = failure.kind.as_str(), "Remote call failed: {}", failure.message);
                    return (name, CallOutcome::Failed(failure));
                }
            }
        }
    }
}

fn readiness(call: &PlannedCall, outcomes: &BTreeMap<CallName, CallOutcome>) -> Readiness {
    let mut blocked = false;
    for dependency in &call.depends_on {
        match outcomes.get(dependency) {
            Some(CallOutcome::Succeeded(_)) => {}
            Some(_) => return Readiness::Skip(*dependency),
            None => blocked = true,
        }
    }
    if blocked {
        Readiness::Blocked
    } else {
        Readiness::Ready
    }
}

fn build_request(
    name: CallName,
    plan: &RemoteCallPlan,
    account: Option<&ResolvedAccount>,
) -> Result<CallRequest, AggregateError> {
    if !name.requires_account() {
        return Ok(CallRequest::ResolveAccount {
            name: plan.target().to_string(),
        });
    }
    let account = account.ok_or(AggregateError::MissingInput(name))?;
    CallRequest::for_account(name, account.id, plan.group_id())
        .ok_or(AggregateError::MissingInput(name))
}
