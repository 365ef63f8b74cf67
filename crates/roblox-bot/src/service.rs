//! `handle_invocation`: one lookup command from admission to terminal edit.
//!
//! Flow:
//! 1. Admit the dedupe key, or answer with the remaining cooldown and stop.
//! 2. Post the progress message, or take over an orphaned one.
//! 3. Run the call plan and render the result. Panics in this step are
//!    caught so the progress message still gets its terminal edit.
//! 4. Terminal edit, then the admission guard releases the key.

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use roblox_client::DirectoryGateway;
use roblox_types::CallName;
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::aggregator::{AggregateError, AggregateResult, CallAggregator, RetryPolicy};
use crate::chat::{ChatError, ChatSurface, ReplyPayload};
use crate::clock::{Clock, SystemClock};
use crate::errors::log_chat_error;
use crate::plan::RemoteCallPlan;
use crate::progress::ProgressReporter;
use crate::render::{cooldown_text, failure_text, RankNames, Renderer};
use crate::tracker::{
    Admission, AdmissionGuard, DedupeKey, DedupeScope, InFlightTracker, ReleasePolicy,
};

/// Tunables for the lookup flow.
#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub cooldown: Duration,
    pub history_scan_depth: u8,
    pub dedupe_scope: DedupeScope,
    pub release: ReleasePolicy,
    pub group_id: u64,
    pub retry: RetryPolicy,
    pub ranks: RankNames,
}

/// One accepted chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub requester_id: u64,
    pub channel_id: u64,
    pub target_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("could not post progress message: {0}")]
    Post(ChatError),
    #[error("terminal edit failed: {0}")]
    TerminalEdit(ChatError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

/// What happened to an invocation. User-visible effects have already gone
/// through the chat surface by the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Completed,
    Partial { unavailable: Vec<CallName> },
    NotFound,
    Rejected { remaining_secs: u64 },
    Failed(InvocationError),
}

type PlanBuilder = fn(&str, u64) -> RemoteCallPlan;

pub struct LookupService<G, K = SystemClock> {
    gateway: G,
    clock: K,
    tracker: Arc<InFlightTracker>,
    aggregator: CallAggregator,
    renderer: Renderer,
    progress: ProgressReporter,
    settings: LookupSettings,
    plan: PlanBuilder,
}

impl<G: DirectoryGateway, K: Clock> LookupService<G, K> {
    pub fn new(gateway: G, clock: K, settings: LookupSettings) -> Self {
        Self {
            gateway,
            clock,
            tracker: Arc::new(InFlightTracker::new()),
            aggregator: CallAggregator::new(settings.retry),
            renderer: Renderer::new(settings.ranks.clone()),
            progress: ProgressReporter::new(settings.history_scan_depth),
            settings,
            plan: |target, group_id| RemoteCallPlan::standard(target, group_id),
        }
    }

    /// Replace the call plan built for each invocation.
    pub fn with_plan(mut self, plan: PlanBuilder) -> Self {
        self.plan = plan;
        self
    }

    /// Keys currently admitted or cooling down.
    pub fn tracked_keys(&self) -> usize {
        self.tracker.len()
    }

    /// Shared handle to the tracker, for reporting.
    pub fn tracker(&self) -> Arc<InFlightTracker> {
        Arc::clone(&self.tracker)
    }

    pub async fn handle_invocation<C: ChatSurface>(
        &self,
        chat: &C,
        invocation: Invocation,
    ) -> InvocationOutcome {
        let target = invocation.target_name.trim();
        let channel_id = invocation.channel_id;
        let key = DedupeKey::new(
            self.settings.dedupe_scope,
            channel_id,
            invocation.requester_id,
            target,
        );

        let now = self.clock.now();
        if let Admission::Rejected { remaining_secs } =
            self.tracker.admit(&key, now, self.settings.cooldown)
        {
            warn!(
                "Rejected lookup of {} by user {}: {}s of cooldown left",
                target, invocation.requester_id, remaining_secs
            );
            let reply = ReplyPayload::Text(cooldown_text(target, remaining_secs));
            if let Err(e) = chat.send(channel_id, &reply).await {
                log_chat_error("Failed to send cooldown notice", &e);
            }
            return InvocationOutcome::Rejected { remaining_secs };
        }

        let _guard = AdmissionGuard::new(&self.tracker, key, self.settings.release);
        info!(
            "Admitted lookup of {} by user {} in channel {}",
            target, invocation.requester_id, channel_id
        );

        let progress = match self.progress.post(chat, channel_id, target).await {
            Ok(progress) => progress,
            Err(e) => {
                log_chat_error("Failed to post progress message", &e);
                return InvocationOutcome::Failed(InvocationError::Post(e));
            }
        };

        let plan = (self.plan)(target, self.settings.group_id);
        let (payload, outcome) = match AssertUnwindSafe(self.lookup(&plan)).catch_unwind().await {
            Ok(Ok((payload, outcome))) => (payload, outcome),
            Ok(Err(e)) => {
                error!("Lookup of {} failed: {}", target, e);
                (
                    ReplyPayload::Text(failure_text(target)),
                    InvocationOutcome::Failed(e.into()),
                )
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Lookup of {} panicked: {}", target, message);
                (
                    ReplyPayload::Text(failure_text(target)),
                    InvocationOutcome::Failed(InvocationError::Unexpected(message)),
                )
            }
        };

        if let Err(e) = progress.finish(chat, &payload).await {
            log_chat_error("Failed to finish progress message", &e);
            return InvocationOutcome::Failed(InvocationError::TerminalEdit(e));
        }

        info!("Lookup of {} finished: {:?}", target, outcome);
        outcome
    }

    async fn lookup(
        &self,
        plan: &RemoteCallPlan,
    ) -> Result<(ReplyPayload, InvocationOutcome), AggregateError> {
        let result = self.aggregator.run(plan, &self.gateway).await?;
        debug!(
            "Plan for {} finished with {} unavailable calls",
            plan.target(),
            result.unavailable().len()
        );
        let payload = ReplyPayload::Embed(self.renderer.render(&result));
        Ok((payload, outcome_of(&result)))
    }
}

fn outcome_of(result: &AggregateResult) -> InvocationOutcome {
    if result
        .resolve_failure()
        .is_some_and(|failure| failure.is_not_found())
    {
        InvocationOutcome::NotFound
    } else if result.account.is_some() && result.is_complete() {
        InvocationOutcome::Completed
    } else {
        InvocationOutcome::Partial {
            unavailable: result.unavailable(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
