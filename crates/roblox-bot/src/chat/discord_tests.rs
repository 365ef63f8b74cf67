//! `SerenityChat` against a local mock of the Discord REST API.
//!
//! Requests are routed to wiremock through serenity's `HttpBuilder::proxy()`;
//! each test checks the method, path and body that reach Discord.

use std::sync::Arc;

use serenity::http::{Http, HttpBuilder};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::render::EmbedField;

const CHANNEL: u64 = 100;
const BOT_USER: u64 = 999;
const MESSAGES_PATH: &str = "/api/v10/channels/100/messages";

fn proxy_http(proxy_url: &str) -> Arc<Http> {
    Arc::new(
        HttpBuilder::new("fake-token")
            .proxy(proxy_url)
            .ratelimiter_disabled(true)
            .build(),
    )
}

fn chat(server: &MockServer) -> SerenityChat {
    SerenityChat::new(proxy_http(&server.uri()), BOT_USER)
}

fn user_json(id: u64, username: &str, bot: bool) -> serde_json::Value {
    serde_json::json!({
        "id": id.to_string(),
        "username": username,
        "global_name": null,
        "avatar": null,
        "bot": bot
    })
}

fn message_json(message_id: u64, author: serde_json::Value, content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": message_id.to_string(),
        "channel_id": CHANNEL.to_string(),
        "author": author,
        "content": content,
        "timestamp": "2024-01-01T00:00:00+00:00",
        "edited_timestamp": null,
        "tts": false,
        "mention_everyone": false,
        "mentions": [],
        "mention_roles": [],
        "attachments": [],
        "embeds": [],
        "pinned": false,
        "type": 0
    })
}

fn bot_message(message_id: u64, content: &str) -> serde_json::Value {
    message_json(message_id, user_json(BOT_USER, "lookup-bot", true), content)
}

fn display() -> DisplayPayload {
    DisplayPayload {
        title: "Builderman (@builderman)".to_string(),
        url: Some("https://www.roblox.com/users/156/profile".to_string()),
        description: None,
        fields: vec![EmbedField {
            name: "Rank".to_string(),
            value: "Officer".to_string(),
            inline: true,
        }],
        thumbnail_url: Some("https://cdn.example/headshot.png".to_string()),
        footer: "Roblox account lookup".to_string(),
        colour: 0x2ecc71,
    }
}

fn handle(message_id: u64) -> MessageHandle {
    MessageHandle {
        channel_id: CHANNEL,
        message_id,
    }
}

// ── send ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_text_posts_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("Fetching profile for `builderman`..."))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(bot_message(1, "Fetching profile for `builderman`...")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sent = chat(&server)
        .send(CHANNEL, &ReplyPayload::text("Fetching profile for `builderman`..."))
        .await
        .unwrap();

    assert_eq!(sent, handle(1));
    server.verify().await;
}

#[tokio::test]
async fn test_send_embed_maps_display_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains(r#""title":"Builderman (@builderman)""#))
        .and(body_string_contains(r#""url":"https://www.roblox.com/users/156/profile""#))
        .and(body_string_contains(r#""name":"Rank""#))
        .and(body_string_contains(r#""value":"Officer""#))
        .and(body_string_contains(r#""text":"Roblox account lookup""#))
        .and(body_string_contains("https://cdn.example/headshot.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bot_message(2, "")))
        .expect(1)
        .mount(&server)
        .await;

    let sent = chat(&server)
        .send(CHANNEL, &ReplyPayload::Embed(display()))
        .await
        .unwrap();

    assert_eq!(sent, handle(2));
    server.verify().await;
}

#[tokio::test]
async fn test_send_without_permission_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "code": 50013,
            "message": "Missing Permissions"
        })))
        .mount(&server)
        .await;

    let err = chat(&server)
        .send(CHANNEL, &ReplyPayload::text("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::PermissionDenied(_)), "{:?}", err);
}

// ── edit ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_edit_to_embed_clears_content() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v10/channels/100/messages/1"))
        .and(body_string_contains(r#""content":"""#))
        .and(body_string_contains(r#""title":"Builderman (@builderman)""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(bot_message(1, "")))
        .expect(1)
        .mount(&server)
        .await;

    chat(&server)
        .edit(&handle(1), &ReplyPayload::Embed(display()))
        .await
        .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn test_edit_to_text_clears_embeds() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v10/channels/100/messages/1"))
        .and(body_string_contains(r#""embeds":[]"#))
        .and(body_string_contains("Something went wrong"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(bot_message(1, "Something went wrong")),
        )
        .expect(1)
        .mount(&server)
        .await;

    chat(&server)
        .edit(&handle(1), &ReplyPayload::text("Something went wrong"))
        .await
        .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn test_edit_of_deleted_message_is_gone() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v10/channels/100/messages/1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": 10008,
            "message": "Unknown Message"
        })))
        .mount(&server)
        .await;

    let err = chat(&server)
        .edit(&handle(1), &ReplyPayload::text("done"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::MessageGone(_)), "{:?}", err);
}

// ── recent_history ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_recent_history_marks_own_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(MESSAGES_PATH))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            bot_message(3, "Fetching profile for `builderman`..."),
            message_json(2, user_json(42, "alice", false), "!rank builderman"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let history = chat(&server).recent_history(CHANNEL, 5).await.unwrap();

    assert_eq!(
        history,
        vec![
            HistoryEntry {
                from_self: true,
                content: "Fetching profile for `builderman`...".to_string(),
                handle: handle(3),
            },
            HistoryEntry {
                from_self: false,
                content: "!rank builderman".to_string(),
                handle: handle(2),
            },
        ]
    );
    server.verify().await;
}
