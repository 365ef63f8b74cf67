//! Discord implementation of [`ChatSurface`] over serenity's HTTP client.

#[cfg(test)]
#[path = "discord_tests.rs"]
mod discord_tests;

use std::sync::Arc;

use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage, GetMessages};
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, MessageId};

use super::{ChatError, ChatSurface, HistoryEntry, MessageHandle, ReplyPayload};
use crate::errors::classify;
use crate::render::DisplayPayload;

#[derive(Clone)]
pub struct SerenityChat {
    http: Arc<Http>,
    bot_user_id: u64,
}

impl SerenityChat {
    pub fn new(http: Arc<Http>, bot_user_id: u64) -> Self {
        Self { http, bot_user_id }
    }

    fn handle(message: &Message) -> MessageHandle {
        MessageHandle {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        }
    }
}

impl ChatSurface for SerenityChat {
    async fn send(
        &self,
        channel_id: u64,
        payload: &ReplyPayload,
    ) -> Result<MessageHandle, ChatError> {
        let builder = match payload {
            ReplyPayload::Text(content) => CreateMessage::new().content(content),
            ReplyPayload::Embed(display) => CreateMessage::new().embed(to_embed(display)),
        };
        let message = ChannelId::new(channel_id)
            .send_message(&*self.http, builder)
            .await
            .map_err(|e| classify(&e))?;
        Ok(Self::handle(&message))
    }

    async fn edit(&self, handle: &MessageHandle, payload: &ReplyPayload) -> Result<(), ChatError> {
        // Switching kinds must clear what the message showed before.
        let builder = match payload {
            ReplyPayload::Text(content) => EditMessage::new().content(content).embeds(Vec::new()),
            ReplyPayload::Embed(display) => {
                EditMessage::new().content("").embed(to_embed(display))
            }
        };
        ChannelId::new(handle.channel_id)
            .edit_message(&*self.http, MessageId::new(handle.message_id), builder)
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn recent_history(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<HistoryEntry>, ChatError> {
        let messages = ChannelId::new(channel_id)
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| classify(&e))?;
        Ok(messages
            .iter()
            .map(|m| HistoryEntry {
                from_self: m.author.id.get() == self.bot_user_id,
                content: m.content.clone(),
                handle: Self::handle(m),
            })
            .collect())
    }
}

fn to_embed(display: &DisplayPayload) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&display.title)
        .colour(display.colour)
        .footer(CreateEmbedFooter::new(&display.footer))
        .fields(
            display
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.value.clone(), f.inline)),
        );
    if let Some(url) = &display.url {
        embed = embed.url(url);
    }
    if let Some(description) = &display.description {
        embed = embed.description(description);
    }
    if let Some(thumbnail) = &display.thumbnail_url {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}
