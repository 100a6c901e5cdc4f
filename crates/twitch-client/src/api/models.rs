use serde::{Deserialize, Serialize};

/// Wrapper for Twitch Helix list responses.
#[derive(Debug, Deserialize)]
pub struct HelixResponse<T> {
    pub data: Vec<T>,
}

/// Channel information from GET /helix/channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    #[serde(default)]
    pub broadcaster_name: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub broadcaster_language: String,
}

/// Request body for PATCH /helix/channels.
///
/// `game_id = "0"` moves the channel to no category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModifyChannelRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Game (category) entry from GET /helix/games.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub box_art_url: String,
}

/// Request body for POST /helix/chat/messages.
#[derive(Debug, Clone, Serialize)]
pub struct SendChatMessageRequest<'a> {
    pub broadcaster_id: &'a str,
    pub sender_id: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatDropReason {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Result entry of POST /helix/chat/messages.
#[derive(Debug, Clone, Deserialize)]
pub struct SentChatMessage {
    #[serde(default)]
    pub message_id: String,
    pub is_sent: bool,
    #[serde(default)]
    pub drop_reason: Option<ChatDropReason>,
}

/// User information from GET /helix/users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub broadcaster_type: String,
    #[serde(default)]
    pub created_at: String,
}

/// Request body for POST /helix/eventsub/subscriptions.
#[derive(Debug, Clone, Serialize)]
pub struct EventSubSubscriptionRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    pub version: String,
    pub condition: serde_json::Value,
    pub transport: EventSubTransport,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSubTransport {
    pub method: String,
    pub session_id: String,
}
