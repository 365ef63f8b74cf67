//! Discord error handling for the bot.
//!
//! Converts serenity errors into [`ChatError`]s and logs them at a level
//! that reflects whether retrying could help.

use serenity::http::HttpError;
use tracing::{debug, error, warn};

use crate::chat::ChatError;

/// Classify a serenity `Error` into a [`ChatError`].
pub fn classify(err: &serenity::Error) -> ChatError {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => classify_response(
            resp.status_code.as_u16(),
            resp.error.code as u32,
            &resp.error.message,
        ),
        _ => {
            debug!("Non-API serenity error: {}", err);
            ChatError::Transport(err.to_string())
        }
    }
}

/// Classify an unsuccessful Discord API response by HTTP status and
/// Discord JSON error code.
pub fn classify_response(status: u16, code: u32, message: &str) -> ChatError {
    match (status, code) {
        // Real retry-after is in the body; one second is conservative.
        (429, _) => ChatError::RateLimited {
            retry_after_secs: 1,
        },
        // Unknown channel / unknown message
        (_, 10003 | 10008) | (404, _) => ChatError::MessageGone(message.to_string()),
        // Missing access / missing permissions / cannot edit another user's message
        (_, 50001 | 50005 | 50013) | (403, _) => ChatError::PermissionDenied(message.to_string()),
        _ => ChatError::Transport(format!("HTTP {} / code {}: {}", status, code, message)),
    }
}

/// Log a chat failure at the appropriate level.
///
/// - Permission and missing-message errors → `error!`
/// - Rate limits and transport errors → `warn!`
pub fn log_chat_error(context: &str, err: &ChatError) {
    if err.is_transient() {
        warn!("{}: {}", context, err);
    } else {
        error!("{}: {}", context, err);
    }
}
