//! Helix-backed implementations of the tracker and command collaborators.
//!
//! Each call reads the latest token from the database, so tokens refreshed
//! by the background loop are picked up without rebuilding anything.
//! Channel edits use the broadcaster token; chat and user lookups use the
//! bot token, or the broadcaster token when no bot account is authorized.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bot_db::Database;
use bot_db::tokens::TokenRole;
use twitch_client::Token;
use twitch_client::api::{ModifyChannelRequest, TwitchApiClient};

use crate::commands::meta::{ChannelUser, UserDirectory};
use crate::error::BotError;
use crate::tracker::{ChannelChange, ChannelInfo, ChannelInfoProvider, ChatSender, GameMatch};

const SENT_MESSAGE_LOG_CAPACITY: usize = 64;

/// Load the active OAuth token for `role` in the client's shape.
pub fn load_token(db: &Database, role: TokenRole) -> Result<Token, BotError> {
    let stored = db
        .get_latest_token(role)?
        .filter(|token| !token.access_token.is_empty())
        .ok_or(BotError::NoToken)?;
    Ok(client_token(stored))
}

/// The stored token chat runs on: the bot account's if authorized, else the
/// broadcaster's.
pub fn stored_chat_token(db: &Database) -> Result<Option<bot_db::tokens::Token>, BotError> {
    for role in [TokenRole::Bot, TokenRole::Broadcaster] {
        if let Some(token) = db
            .get_latest_token(role)?
            .filter(|token| !token.access_token.is_empty())
        {
            return Ok(Some(token));
        }
    }
    Ok(None)
}

pub fn load_chat_token(db: &Database) -> Result<Token, BotError> {
    stored_chat_token(db)?
        .map(client_token)
        .ok_or(BotError::NoToken)
}

pub fn client_token(stored: bot_db::tokens::Token) -> Token {
    Token {
        access_token: stored.access_token,
        refresh_token: stored.refresh_token,
        scope: stored.scope,
        expires_at: stored.expires_at,
    }
}

pub fn stored_token(token: Token, user_id: String) -> bot_db::tokens::Token {
    bot_db::tokens::Token {
        user_id,
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        scope: token.scope,
        expires_at: token.expires_at,
    }
}

/// Ids of recent messages the bot sent, so their EventSub echoes are skipped.
///
/// Matching by message id rather than chatter id keeps the broadcaster's own
/// commands working when bot and broadcaster share an account.
#[derive(Debug, Default)]
pub struct SentMessageLog {
    ids: Mutex<VecDeque<String>>,
}

impl SentMessageLog {
    pub fn record(&self, message_id: &str) {
        if message_id.is_empty() {
            return;
        }
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if ids.len() == SENT_MESSAGE_LOG_CAPACITY {
            ids.pop_front();
        }
        ids.push_back(message_id.to_string());
    }

    /// Whether `message_id` was sent by the bot. Each id matches once.
    pub fn take(&self, message_id: &str) -> bool {
        if message_id.is_empty() {
            return false;
        }
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        match ids.iter().position(|id| id == message_id) {
            Some(index) => {
                ids.remove(index);
                true
            }
            None => false,
        }
    }
}

/// The home channel's metadata via `/helix/channels` and `/helix/games`.
pub struct HelixChannel {
    api: Arc<TwitchApiClient>,
    db: Database,
    broadcaster_id: String,
}

impl HelixChannel {
    pub fn new(api: Arc<TwitchApiClient>, db: Database, broadcaster_id: String) -> Self {
        Self {
            api,
            db,
            broadcaster_id,
        }
    }
}

#[async_trait]
impl ChannelInfoProvider for HelixChannel {
    async fn fetch_channel_info(&self) -> Result<ChannelInfo, BotError> {
        let token = load_token(&self.db, TokenRole::Broadcaster)?;
        let info = self
            .api
            .get_channel_info(&token, &self.broadcaster_id)
            .await?;
        Ok(ChannelInfo {
            game_name: info.game_name,
            title: info.title,
        })
    }

    async fn modify_channel(&self, change: ChannelChange) -> Result<(), BotError> {
        let token = load_token(&self.db, TokenRole::Broadcaster)?;
        let request = ModifyChannelRequest {
            game_id: change.game_id,
            title: change.title,
        };
        self.api
            .modify_channel(&token, &self.broadcaster_id, &request)
            .await?;
        tracing::info!(
            game_id = ?request.game_id,
            title = ?request.title,
            "Channel modified"
        );
        Ok(())
    }

    async fn search_games(&self, names: &[String]) -> Result<Vec<GameMatch>, BotError> {
        let token = load_token(&self.db, TokenRole::Broadcaster)?;
        let games = self.api.get_games_by_name(&token, names).await?;
        Ok(games
            .into_iter()
            .map(|game| GameMatch {
                id: game.id,
                name: game.name,
            })
            .collect())
    }
}

/// Chat output via `POST /helix/chat/messages`, sent as the bot user.
pub struct HelixChat {
    api: Arc<TwitchApiClient>,
    db: Database,
    sender_id: String,
    sent: Arc<SentMessageLog>,
}

impl HelixChat {
    pub fn new(
        api: Arc<TwitchApiClient>,
        db: Database,
        sender_id: String,
        sent: Arc<SentMessageLog>,
    ) -> Self {
        Self {
            api,
            db,
            sender_id,
            sent,
        }
    }
}

#[async_trait]
impl ChatSender for HelixChat {
    async fn send_chat_message(&self, broadcaster_id: &str, text: &str) -> Result<(), BotError> {
        let token = load_chat_token(&self.db)?;
        let sent = self
            .api
            .send_chat_message(&token, broadcaster_id, &self.sender_id, text)
            .await?;
        self.sent.record(&sent.message_id);
        tracing::debug!(broadcaster_id, message_id = %sent.message_id, "Chat message sent");
        Ok(())
    }
}

/// Login lookups via `/helix/users`.
pub struct HelixUsers {
    api: Arc<TwitchApiClient>,
    db: Database,
}

impl HelixUsers {
    pub fn new(api: Arc<TwitchApiClient>, db: Database) -> Self {
        Self { api, db }
    }
}

#[async_trait]
impl UserDirectory for HelixUsers {
    async fn find_user(&self, login: &str) -> Result<Option<ChannelUser>, BotError> {
        let token = load_chat_token(&self.db)?;
        let user = self.api.get_user_by_login(&token, login).await?;
        Ok(user.map(|user| ChannelUser {
            id: user.id,
            login: user.login,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(access_token: &str, user_id: &str) -> bot_db::tokens::Token {
        stored_token(
            Token {
                access_token: access_token.into(),
                refresh_token: "refresh".into(),
                scope: "user:bot".into(),
                expires_at: 42,
            },
            user_id.into(),
        )
    }

    #[test]
    fn load_token_requires_a_stored_token() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            load_token(&db, TokenRole::Broadcaster),
            Err(BotError::NoToken)
        ));

        db.save_token(TokenRole::Broadcaster, &token("access", "1234"))
            .unwrap();

        let loaded = load_token(&db, TokenRole::Broadcaster).unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.expires_at, 42);
        assert!(matches!(
            load_token(&db, TokenRole::Bot),
            Err(BotError::NoToken)
        ));
    }

    #[test]
    fn load_token_rejects_empty_access_token() {
        let db = Database::open_in_memory().unwrap();
        db.save_token(TokenRole::Broadcaster, &token("", ""))
            .unwrap();
        assert!(matches!(
            load_token(&db, TokenRole::Broadcaster),
            Err(BotError::NoToken)
        ));
        assert!(stored_chat_token(&db).unwrap().is_none());
    }

    #[test]
    fn chat_prefers_the_bot_token() {
        let db = Database::open_in_memory().unwrap();
        db.save_token(TokenRole::Broadcaster, &token("streamer", "1000"))
            .unwrap();
        assert_eq!(stored_chat_token(&db).unwrap().unwrap().user_id, "1000");

        db.save_token(TokenRole::Bot, &token("bot", "9000")).unwrap();
        assert_eq!(stored_chat_token(&db).unwrap().unwrap().user_id, "9000");
        assert_eq!(load_chat_token(&db).unwrap().access_token, "bot");
        assert_eq!(
            load_token(&db, TokenRole::Broadcaster).unwrap().access_token,
            "streamer"
        );
    }

    #[test]
    fn sent_log_matches_each_id_once() {
        let log = SentMessageLog::default();
        log.record("m-1");
        log.record("");
        assert!(!log.take(""));
        assert!(log.take("m-1"));
        assert!(!log.take("m-1"));
    }

    #[test]
    fn sent_log_forgets_oldest_ids() {
        let log = SentMessageLog::default();
        for i in 0..=SENT_MESSAGE_LOG_CAPACITY {
            log.record(&format!("m-{i}"));
        }
        assert!(!log.take("m-0"));
        assert!(log.take(&format!("m-{SENT_MESSAGE_LOG_CAPACITY}")));
    }
}
