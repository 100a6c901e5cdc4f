//! Typed payloads for the EventSub notifications the bot consumes.

use serde::Deserialize;

/// `channel.update` (v2). Carries only the new values, not what changed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelUpdateEvent {
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
}

/// `stream.online` / `stream.offline`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStatusEvent {
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatBadge {
    pub set_id: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatMessageBody {
    #[serde(default)]
    pub text: String,
}

/// `channel.chat.message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageEvent {
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
    pub chatter_user_id: String,
    #[serde(default)]
    pub chatter_user_login: String,
    #[serde(default)]
    pub chatter_user_name: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub message: ChatMessageBody,
    #[serde(default)]
    pub badges: Vec<ChatBadge>,
}

impl ChatMessageEvent {
    pub fn has_badge(&self, set_id: &str) -> bool {
        self.badges.iter().any(|badge| badge.set_id == set_id)
    }

    pub fn is_broadcaster(&self) -> bool {
        self.chatter_user_id == self.broadcaster_user_id || self.has_badge("broadcaster")
    }

    /// Moderators and the broadcaster may use mutating commands.
    pub fn is_moderator(&self) -> bool {
        self.is_broadcaster() || self.has_badge("moderator")
    }
}
