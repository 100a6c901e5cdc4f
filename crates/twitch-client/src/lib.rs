//! Twitch integration client library for the chat bot.
//!
//! Provides OAuth authentication, the EventSub WebSocket client and a
//! Helix REST client covering channel info, game search, chat and users.

pub mod api;
pub mod auth;
pub mod eventsub;

use serde::{Deserialize, Serialize};

/// Token data for OAuth authentication.
///
/// The caller is responsible for persisting this (e.g. via bot-db).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_at: i64,
}

/// Unified error type for the twitch-client crate.
#[derive(Debug, thiserror::Error)]
pub enum TwitchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication required: no valid token")]
    AuthRequired,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Twitch API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Chat message dropped: {0}")]
    ChatDropped(String),

    #[error("EventSub error: {0}")]
    EventSub(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// OAuth scopes required by the bot.
///
/// `channel:manage:broadcast` covers title/game edits, the chat scopes cover
/// reading commands over EventSub and replying through Helix.
pub const SCOPES: &[&str] = &[
    "channel:manage:broadcast",
    "user:read:chat",
    "user:write:chat",
    "user:bot",
    "channel:bot",
];
