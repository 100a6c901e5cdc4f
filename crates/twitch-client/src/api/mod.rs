//! Twitch Helix REST API client.
//!
//! Provides typed access to the endpoints the bot needs with automatic
//! Bearer token + Client-ID header injection.

mod channels;
mod chat;
mod games;
mod request;
mod subscriptions;
mod users;

pub mod models;

pub use models::{
    ChannelInfo, EventSubSubscriptionRequest, EventSubTransport, Game, HelixResponse,
    ModifyChannelRequest, SendChatMessageRequest, SentChatMessage, TwitchUser,
};

use crate::{Token, TwitchError};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// Twitch Helix API client with automatic auth header injection.
pub struct TwitchApiClient {
    pub(super) http: reqwest::Client,
    pub(super) client_id: String,
}
