//! Owner-only bot administration: extra channels and the startup greeting.

use std::sync::Arc;

use async_trait::async_trait;
use bot_db::Database;
use tokio::sync::Notify;

use crate::error::BotError;

pub const READY_MESSAGE: &str = "the bot is reloaded.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    pub id: String,
    pub login: String,
}

/// Resolves chat logins to Twitch users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, login: &str) -> Result<Option<ChannelUser>, BotError>;
}

pub struct MetaCommands {
    users: Arc<dyn UserDirectory>,
    db: Database,
    channels_changed: Arc<Notify>,
}

impl MetaCommands {
    /// `channels_changed` is notified whenever the joined channel set changes.
    pub fn new(users: Arc<dyn UserDirectory>, db: Database, channels_changed: Arc<Notify>) -> Self {
        Self {
            users,
            db,
            channels_changed,
        }
    }

    /// `channel_add <login>`: start reading that channel's chat.
    pub async fn channel_add(&self, rest: &str) -> Result<Vec<String>, BotError> {
        let Some(user) = self.resolve(rest).await? else {
            return Ok(vec![unknown_user_reply(rest)]);
        };
        let added = self.db.add_joined_channel(&user.id, &user.login)?;
        if added {
            tracing::info!(user_id = %user.id, login = %user.login, "Channel joined");
        }
        self.channels_changed.notify_one();
        Ok(vec![format!("Added the channel {}.", user.login)])
    }

    /// `channel_del <login>`: stop reading that channel's chat.
    pub async fn channel_del(&self, rest: &str) -> Result<Vec<String>, BotError> {
        let Some(user) = self.resolve(rest).await? else {
            return Ok(vec![unknown_user_reply(rest)]);
        };
        if self.db.remove_joined_channel(&user.id)? {
            tracing::info!(user_id = %user.id, login = %user.login, "Channel left");
            self.channels_changed.notify_one();
        }
        Ok(vec![format!("Deleted the channel {}", user.login)])
    }

    async fn resolve(&self, rest: &str) -> Result<Option<ChannelUser>, BotError> {
        let Some(login) = rest.split_whitespace().next() else {
            return Ok(None);
        };
        self.users.find_user(login).await
    }
}

fn unknown_user_reply(rest: &str) -> String {
    match rest.split_whitespace().next() {
        Some(login) => format!("Couldn't find a channel named {login}"),
        None => "Usage: channel_add|channel_del <login>".to_string(),
    }
}
