//! Serenity event handler and prefix-command parsing

use std::sync::Arc;

use roblox_client::RobloxClient;
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{debug, error, info};

use crate::chat::{ChatSurface, ReplyPayload, SerenityChat};
use crate::errors::log_chat_error;
use crate::health::AppState;
use crate::render::usage_text;
use crate::service::{Invocation, LookupService};

/// Command words that start a lookup.
const LOOKUP_COMMANDS: [&str; 3] = ["rank", "profile", "lookup"];

pub type BotService = LookupService<RobloxClient>;

/// TypeMap slot for the shared lookup service.
pub struct LookupServiceKey;

impl TypeMapKey for LookupServiceKey {
    type Value = Arc<BotService>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Lookup(&'a str),
    /// Lookup command without a name.
    Usage,
}

/// Parse `<prefix><command> <name>`. Anything that is not a lookup
/// command yields `None`.
pub fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<Command<'a>> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let command = words.next()?;
    if !LOOKUP_COMMANDS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(command))
    {
        return None;
    }
    // Account names never contain whitespace; extra words are ignored.
    match words.next() {
        Some(name) => Some(Command::Lookup(name)),
        None => Some(Command::Usage),
    }
}

pub struct Handler {
    prefix: String,
}

impl Handler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        let data = ctx.data.read().await;
        if let Some(state) = data.get::<AppState>() {
            state.set_bot_username(ready.user.name.clone()).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages
        if msg.author.bot {
            return;
        }

        let Some(command) = parse_command(&msg.content, &self.prefix) else {
            return;
        };

        let bot_user_id = ctx.cache.current_user().id.get();
        let chat = SerenityChat::new(ctx.http.clone(), bot_user_id);
        let channel_id = msg.channel_id.get();

        let target = match command {
            Command::Lookup(target) => target,
            Command::Usage => {
                let reply = ReplyPayload::Text(usage_text(&self.prefix));
                if let Err(e) = chat.send(channel_id, &reply).await {
                    log_chat_error("Failed to send usage reply", &e);
                }
                return;
            }
        };

        let service = {
            let data = ctx.data.read().await;
            match data.get::<LookupServiceKey>() {
                Some(s) => s.clone(),
                None => {
                    error!("LookupService not found in context data");
                    return;
                }
            }
        };

        let outcome = service
            .handle_invocation(
                &chat,
                Invocation {
                    requester_id: msg.author.id.get(),
                    channel_id,
                    target_name: target.to_string(),
                },
            )
            .await;
        debug!("Invocation by {} ended: {:?}", msg.author.name, outcome);
    }
}
