//! Chat surface the lookup flow talks to.
//!
//! The service only needs to send a message, edit one it sent, and read
//! recent channel history. [`SerenityChat`] does this against Discord; tests
//! use the in-memory [`mock::MockChat`].

#[cfg(test)]
pub mod mock;
mod discord;

use std::future::Future;

use thiserror::Error;

use crate::render::DisplayPayload;

pub use self::discord::SerenityChat;

/// Content of a message the bot sends or edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    Text(String),
    Embed(DisplayPayload),
}

impl ReplyPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

/// Reference to a message the bot can edit later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub channel_id: u64,
    pub message_id: u64,
}

/// One message from recent channel history, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Authored by this bot.
    pub from_self: bool,
    pub content: String,
    pub handle: MessageHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("message or channel no longer exists: {0}")]
    MessageGone(String),
    #[error("chat transport error: {0}")]
    Transport(String),
}

impl ChatError {
    /// Retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_))
    }
}

pub trait ChatSurface: Send + Sync + 'static {
    fn send(
        &self,
        channel_id: u64,
        payload: &ReplyPayload,
    ) -> impl Future<Output = Result<MessageHandle, ChatError>> + Send;

    fn edit(
        &self,
        handle: &MessageHandle,
        payload: &ReplyPayload,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;

    fn recent_history(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, ChatError>> + Send;
}
