//! Progress reporter: owns the single status message of one invocation.
//!
//! Flow:
//! 1. [`ProgressReporter::post`] scans a bounded window of recent channel
//!    history for a bot message that already shows the "fetching" text for
//!    this target and takes it over; otherwise it sends a new one.
//! 2. [`PostedProgress::finish`] performs the terminal edit. It consumes the
//!    handle, so a second terminal edit does not type-check.
//!
//! The history scan is a re-entry heuristic only. Duplicate work is already
//! prevented by the in-flight tracker. A message is owned by at most one live
//! invocation at a time: [`ClaimedMessages`] records the owners, and the scan
//! only takes over messages nobody holds, such as one left behind by a run
//! that never reached its terminal edit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::Duration;
use tracing::{debug, warn};

use crate::chat::{ChatError, ChatSurface, MessageHandle, ReplyPayload};
use crate::render::fetching_text;

/// Maximum attempts for the terminal edit.
const MAX_EDIT_ATTEMPTS: u32 = 3;

/// Progress messages currently owned by a live invocation.
#[derive(Debug, Clone, Default)]
struct ClaimedMessages {
    inner: Arc<Mutex<HashSet<MessageHandle>>>,
}

impl ClaimedMessages {
    /// Claim `handle`, or `None` if another invocation holds it.
    fn try_claim(&self, handle: MessageHandle) -> Option<Claim> {
        let inserted = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle);
        inserted.then(|| Claim {
            claims: self.clone(),
            handle,
        })
    }

    #[cfg(test)]
    fn contains(&self, handle: &MessageHandle) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(handle)
    }
}

/// Ownership of one progress message; released on drop.
#[derive(Debug)]
struct Claim {
    claims: ClaimedMessages,
    handle: MessageHandle,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.handle);
    }
}

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    scan_depth: u8,
    claims: ClaimedMessages,
}

impl ProgressReporter {
    pub fn new(scan_depth: u8) -> Self {
        Self {
            scan_depth,
            claims: ClaimedMessages::default(),
        }
    }

    /// Move from not-started to posted.
    pub async fn post<C: ChatSurface>(
        &self,
        chat: &C,
        channel_id: u64,
        target: &str,
    ) -> Result<PostedProgress, ChatError> {
        let text = fetching_text(target);
        let payload = ReplyPayload::Text(text.clone());

        for handle in self.find_existing(chat, channel_id, &text).await {
            let Some(claim) = self.claims.try_claim(handle) else {
                debug!(
                    "Progress message {} belongs to a live invocation",
                    handle.message_id
                );
                continue;
            };
            match chat.edit(&handle, &payload).await {
                Ok(()) => {
                    debug!(
                        "Reusing progress message {} for {}",
                        handle.message_id, target
                    );
                    return Ok(PostedProgress {
                        handle,
                        reused: true,
                        _claim: claim,
                    });
                }
                Err(e) => {
                    warn!(
                        "Could not take over progress message {}: {}. Sending a new one",
                        handle.message_id, e
                    );
                    break;
                }
            }
        }

        let handle = chat.send(channel_id, &payload).await?;
        debug!(
            "Posted progress message {} for {}",
            handle.message_id, target
        );
        let Some(claim) = self.claims.try_claim(handle) else {
            return Err(ChatError::Transport(format!(
                "message {} was already claimed",
                handle.message_id
            )));
        };
        Ok(PostedProgress {
            handle,
            reused: false,
            _claim: claim,
        })
    }

    /// Own "fetching" messages for this target, newest first.
    async fn find_existing<C: ChatSurface>(
        &self,
        chat: &C,
        channel_id: u64,
        text: &str,
    ) -> Vec<MessageHandle> {
        if self.scan_depth == 0 {
            return Vec::new();
        }
        match chat.recent_history(channel_id, self.scan_depth).await {
            Ok(history) => history
                .into_iter()
                .filter(|entry| entry.from_self && entry.content.starts_with(text))
                .map(|entry| entry.handle)
                .collect(),
            Err(e) => {
                warn!("History scan failed in channel {}: {}", channel_id, e);
                Vec::new()
            }
        }
    }
}

/// A progress message in the posted state.
#[derive(Debug)]
#[must_use = "a posted progress message must be finished"]
pub struct PostedProgress {
    handle: MessageHandle,
    reused: bool,
    _claim: Claim,
}

impl PostedProgress {
    pub fn handle(&self) -> MessageHandle {
        self.handle
    }

    /// Whether an earlier message from channel history was taken over.
    pub fn reused(&self) -> bool {
        self.reused
    }

    /// Terminal edit. Transient chat failures are retried with backoff; a
    /// rate limit waits at least as long as Discord asked. The claim on the
    /// message is released once this returns.
    pub async fn finish<C: ChatSurface>(
        self,
        chat: &C,
        payload: &ReplyPayload,
    ) -> Result<(), ChatError> {
        let mut attempt = 1u32;
        loop {
            match chat.edit(&self.handle, payload).await {
                Ok(()) => {
                    debug!(
                        "Terminal edit of message {} (attempt {})",
                        self.handle.message_id, attempt
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < MAX_EDIT_ATTEMPTS => {
                    let backoff = edit_backoff(attempt, &e);
                    warn!(
                        "Terminal edit failed (attempt {}): {}. Retrying in {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn edit_backoff(attempt: u32, err: &ChatError) -> Duration {
    let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
    match err {
        ChatError::RateLimited { retry_after_secs } => {
            backoff.max(Duration::from_secs(*retry_after_secs))
        }
        _ => backoff,
    }
}
