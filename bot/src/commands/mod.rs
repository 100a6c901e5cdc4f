//! Chat command parsing and routing.
//!
//! Three components handle commands: channel management (game/title, home
//! channel only), meta (owner-only channel join/part) and stats.

pub mod management;
pub mod meta;
pub mod stats;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use twitch_client::eventsub::events::ChatMessageEvent;

use crate::error::BotError;
use crate::tracker::{ChannelTracker, ChatSender};

use meta::MetaCommands;

pub const GENERIC_FAILURE_REPLY: &str = "Something went wrong, try again later.";

/// Who sent a chat command and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub channel_id: String,
    pub chatter_id: String,
    pub chatter_login: String,
    pub is_moderator: bool,
}

impl From<&ChatMessageEvent> for CommandContext {
    fn from(event: &ChatMessageEvent) -> Self {
        Self {
            channel_id: event.broadcaster_user_id.clone(),
            chatter_id: event.chatter_user_id.clone(),
            chatter_login: event.chatter_user_login.clone(),
            is_moderator: event.is_moderator(),
        }
    }
}

/// A prefixed command split into its lowercased name and the raw remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: String,
    pub rest: &'a str,
}

pub fn parse_invocation<'a>(prefix: &str, text: &'a str) -> Option<Invocation<'a>> {
    let body = text.trim().strip_prefix(prefix)?;
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(Invocation {
        name: name.to_lowercase(),
        rest,
    })
}

/// Routes chat messages to the command components and posts their replies.
pub struct CommandRouter {
    prefix: String,
    home_channel_id: String,
    owner_id: String,
    tracker: ChannelTracker,
    meta: MetaCommands,
    chat: Arc<dyn ChatSender>,
}

impl CommandRouter {
    pub fn new(
        prefix: String,
        owner_id: String,
        tracker: ChannelTracker,
        meta: MetaCommands,
        chat: Arc<dyn ChatSender>,
    ) -> Self {
        Self {
            prefix,
            home_channel_id: tracker.broadcaster_id().to_string(),
            owner_id,
            tracker,
            meta,
            chat,
        }
    }

    pub fn tracker(&self) -> &ChannelTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ChannelTracker {
        &mut self.tracker
    }

    /// Handle one chat message. Returns whether it was a known command.
    pub async fn handle_message(&mut self, ctx: &CommandContext, text: &str) -> bool {
        let Some(invocation) = parse_invocation(&self.prefix, text) else {
            return false;
        };

        let replies = match self.dispatch(ctx, &invocation).await {
            Ok(Some(replies)) => replies,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(
                    command = %invocation.name,
                    chatter = %ctx.chatter_login,
                    "Command failed: {e}"
                );
                vec![GENERIC_FAILURE_REPLY.to_string()]
            }
        };

        for reply in replies {
            if let Err(e) = self.chat.send_chat_message(&ctx.channel_id, &reply).await {
                tracing::warn!(channel_id = %ctx.channel_id, "Failed to send reply: {e}");
            }
        }
        true
    }

    /// `Ok(None)` when the message is not a command this channel or chatter may use.
    async fn dispatch(
        &mut self,
        ctx: &CommandContext,
        invocation: &Invocation<'_>,
    ) -> Result<Option<Vec<String>>, BotError> {
        let in_home = ctx.channel_id == self.home_channel_id;
        let is_owner = !self.owner_id.is_empty() && ctx.chatter_id == self.owner_id;

        let replies = match invocation.name.as_str() {
            "game" if in_home => {
                management::game(&mut self.tracker, ctx, invocation.rest).await?
            }
            "title" if in_home => {
                management::title(&mut self.tracker, ctx, &self.prefix, invocation.rest).await?
            }
            "channel_add" if is_owner => self.meta.channel_add(invocation.rest).await?,
            "channel_del" if is_owner => self.meta.channel_del(invocation.rest).await?,
            "mmr" => stats::mmr(),
            _ => return Ok(None),
        };

        tracing::debug!(
            command = %invocation.name,
            chatter = %ctx.chatter_login,
            replies = replies.len(),
            "Command handled"
        );
        Ok(Some(replies))
    }
}
