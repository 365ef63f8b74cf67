//! In-memory chat surface for tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::{ChatError, ChatSurface, HistoryEntry, MessageHandle, ReplyPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub handle: MessageHandle,
    pub from_self: bool,
    pub payload: ReplyPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOp {
    Send(MessageHandle, ReplyPayload),
    Edit(MessageHandle, ReplyPayload),
    History(u64, u8),
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// Oldest first.
    messages: Vec<SentMessage>,
    ops: Vec<ChatOp>,
    fail_send: Option<ChatError>,
    fail_edit: Option<ChatError>,
    fail_next_edit: Option<ChatError>,
    fail_history: Option<ChatError>,
}

#[derive(Clone, Default)]
pub struct MockChat {
    state: Arc<Mutex<State>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a message to a channel's history as if it were already there.
    pub fn seed(&self, channel_id: u64, from_self: bool, content: &str) -> MessageHandle {
        let mut state = self.state();
        state.next_id += 1;
        let handle = MessageHandle {
            channel_id,
            message_id: state.next_id,
        };
        state.messages.push(SentMessage {
            handle,
            from_self,
            payload: ReplyPayload::text(content),
        });
        handle
    }

    pub fn fail_send(&self, error: ChatError) {
        self.state().fail_send = Some(error);
    }

    pub fn fail_edit(&self, error: ChatError) {
        self.state().fail_edit = Some(error);
    }

    /// Fails only the next edit.
    pub fn fail_next_edit(&self, error: ChatError) {
        self.state().fail_next_edit = Some(error);
    }

    pub fn fail_history(&self, error: ChatError) {
        self.state().fail_history = Some(error);
    }

    pub fn ops(&self) -> Vec<ChatOp> {
        self.state().ops.clone()
    }

    pub fn sends(&self) -> Vec<ReplyPayload> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ChatOp::Send(_, payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageHandle, ReplyPayload)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ChatOp::Edit(handle, payload) => Some((handle, payload)),
                _ => None,
            })
            .collect()
    }

    /// Current content of a message.
    pub fn message(&self, handle: &MessageHandle) -> Option<ReplyPayload> {
        self.state()
            .messages
            .iter()
            .find(|m| m.handle == *handle)
            .map(|m| m.payload.clone())
    }
}

impl ChatSurface for MockChat {
    async fn send(
        &self,
        channel_id: u64,
        payload: &ReplyPayload,
    ) -> Result<MessageHandle, ChatError> {
        let mut state = self.state();
        if let Some(error) = state.fail_send.clone() {
            return Err(error);
        }
        state.next_id += 1;
        let handle = MessageHandle {
            channel_id,
            message_id: state.next_id,
        };
        state.messages.push(SentMessage {
            handle,
            from_self: true,
            payload: payload.clone(),
        });
        state.ops.push(ChatOp::Send(handle, payload.clone()));
        Ok(handle)
    }

    async fn edit(&self, handle: &MessageHandle, payload: &ReplyPayload) -> Result<(), ChatError> {
        let mut state = self.state();
        if let Some(error) = state.fail_next_edit.take() {
            return Err(error);
        }
        if let Some(error) = state.fail_edit.clone() {
            return Err(error);
        }
        let Some(message) = state.messages.iter_mut().find(|m| m.handle == *handle) else {
            return Err(ChatError::MessageGone(format!(
                "message {} not found",
                handle.message_id
            )));
        };
        message.payload = payload.clone();
        state.ops.push(ChatOp::Edit(*handle, payload.clone()));
        Ok(())
    }

    async fn recent_history(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<HistoryEntry>, ChatError> {
        let mut state = self.state();
        state.ops.push(ChatOp::History(channel_id, limit));
        if let Some(error) = state.fail_history.clone() {
            return Err(error);
        }
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.handle.channel_id == channel_id)
            .take(usize::from(limit))
            .map(|m| HistoryEntry {
                from_self: m.from_self,
                content: match &m.payload {
                    ReplyPayload::Text(content) => content.clone(),
                    ReplyPayload::Embed(_) => String::new(),
                },
                handle: m.handle,
            })
            .collect())
    }
}
