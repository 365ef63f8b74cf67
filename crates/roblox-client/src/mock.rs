//! Scripted gateway for unit testing without a live directory.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! roblox-client = { path = "...", features = ["test-support"] }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roblox_types::{CallFailure, CallName, CallPayload, CallRequest};

use crate::gateway::DirectoryGateway;

type Reply = Result<CallPayload, CallFailure>;

#[derive(Clone)]
enum Scripted {
    Reply(Reply),
    Panic(String),
}

#[derive(Default)]
struct MockState {
    queued: HashMap<CallName, VecDeque<Scripted>>,
    standing: HashMap<CallName, Scripted>,
    delays: HashMap<CallName, Duration>,
    calls: Vec<CallRequest>,
}

/// Gateway that replays scripted outcomes and records every request.
///
/// Queued (`*_once`) outcomes are consumed first; after that the standing
/// outcome for the call name applies. An unscripted call fails as
/// `Malformed`.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `name` call with `reply`.
    pub fn respond(&self, name: CallName, reply: Reply) -> &Self {
        self.state
            .lock()
            .unwrap()
            .standing
            .insert(name, Scripted::Reply(reply));
        self
    }

    /// Answer the next `name` call with `reply`, ahead of the standing reply.
    pub fn respond_once(&self, name: CallName, reply: Reply) -> &Self {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(name)
            .or_default()
            .push_back(Scripted::Reply(reply));
        self
    }

    /// Panic inside every `name` call.
    pub fn panic_on(&self, name: CallName, message: impl Into<String>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .standing
            .insert(name, Scripted::Panic(message.into()));
        self
    }

    /// Delay every `name` call by `delay` before answering.
    pub fn delay(&self, name: CallName, delay: Duration) -> &Self {
        self.state.lock().unwrap().delays.insert(name, delay);
        self
    }

    /// All requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<CallRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, name: CallName) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|r| r.name() == name)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

impl DirectoryGateway for MockGateway {
    async fn call(&self, request: &CallRequest) -> Reply {
        let name = request.name();
        let (scripted, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(request.clone());
            let scripted = state
                .queued
                .get_mut(&name)
                .and_then(VecDeque::pop_front)
                .or_else(|| state.standing.get(&name).cloned());
            (scripted, state.delays.get(&name).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match scripted {
            Some(Scripted::Reply(reply)) => reply,
            Some(Scripted::Panic(message)) => panic!("{}", message),
            None => Err(CallFailure::malformed(format!("no scripted reply for {}", name))),
        }
    }
}
