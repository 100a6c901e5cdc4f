//! Channel state tracker: cached game/title, echo suppression and title history.
//!
//! Twitch `channel.update` notifications carry the new game and title only.
//! They say nothing about what changed or who changed it, so the tracker
//! keeps the last seen values itself. Changes made through the bot stamp a
//! time; an update arriving inside the echo window after such a stamp is
//! treated as the echo of the bot's own change and is not announced.
//!
//! Known edge cases of the time heuristic:
//! - an external change landing inside the window right after a bot change
//!   is not announced;
//! - a failed modify call leaves its stamp behind, so an external change
//!   inside that window is not announced either.

mod store;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::BotError;

/// Default echo-suppression window after a bot-initiated change.
pub const ECHO_SUPPRESSION_SECS: i64 = 15;
/// Default age after which title history rows are pruned.
pub const TITLE_HISTORY_RETENTION_DAYS: i64 = 30;
/// How far in the past the changed-at stamps start, so startup never suppresses.
pub const STARTUP_STAMP_AGE_SECS: i64 = 60 * 60;

pub const NO_GAME_LABEL: &str = "No game category";
pub const UNCATEGORIZED_GAME_ID: &str = "0";
pub const CLEAR_KEYWORD: &str = "clear";

const GAME_SYNONYMS: &[(&str, &str)] = &[("dota", "Dota 2"), ("er", "Elden Ring")];

/// Current public channel metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub game_name: String,
    pub title: String,
}

/// A channel modification. `game_id = "0"` means no category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelChange {
    pub game_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMatch {
    pub id: String,
    pub name: String,
}

/// Reads and edits the home channel's game and title.
#[async_trait]
pub trait ChannelInfoProvider: Send + Sync {
    async fn fetch_channel_info(&self) -> Result<ChannelInfo, BotError>;
    async fn modify_channel(&self, change: ChannelChange) -> Result<(), BotError>;
    /// Exact-name lookup; an empty list means no match.
    async fn search_games(&self, names: &[String]) -> Result<Vec<GameMatch>, BotError>;
}

/// Posts chat messages as the bot.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_chat_message(&self, broadcaster_id: &str, text: &str) -> Result<(), BotError>;
}

/// Persisted log of titles keyed by title.
#[async_trait]
pub trait TitleHistoryStore: Send + Sync {
    async fn upsert_title(&self, title: &str, edit_time: DateTime<Utc>) -> Result<(), BotError>;
    /// Titles newest first.
    async fn query_titles(&self, limit: u32, offset: u32) -> Result<Vec<String>, BotError>;
    async fn delete_titles_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, BotError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tunables for the tracker.
#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    pub echo_window: Duration,
    pub history_retention: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            echo_window: Duration::seconds(ECHO_SUPPRESSION_SECS),
            history_retention: Duration::days(TITLE_HISTORY_RETENTION_DAYS),
        }
    }
}

/// Last known channel state. Lives as long as the tracker; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedState {
    pub game_name: String,
    pub title: String,
    pub game_changed_at: DateTime<Utc>,
    pub title_changed_at: DateTime<Utc>,
}

/// Values carried by a `channel.update` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub game_name: String,
    pub title: String,
}

/// What a channel update led to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub announced_game: bool,
    pub announced_title: bool,
    pub recorded_title: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameChange {
    Cleared,
    Changed { name: String },
    NotFound,
}

pub struct ChannelTracker {
    broadcaster_id: String,
    state: TrackedState,
    settings: TrackerSettings,
    channel: Arc<dyn ChannelInfoProvider>,
    history: Arc<dyn TitleHistoryStore>,
    chat: Arc<dyn ChatSender>,
    clock: Arc<dyn Clock>,
}

impl ChannelTracker {
    /// Fetch the channel once and start tracking from it.
    pub async fn start(
        broadcaster_id: String,
        settings: TrackerSettings,
        channel: Arc<dyn ChannelInfoProvider>,
        history: Arc<dyn TitleHistoryStore>,
        chat: Arc<dyn ChatSender>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BotError> {
        let info = channel.fetch_channel_info().await?;
        let stamp = clock.now() - Duration::seconds(STARTUP_STAMP_AGE_SECS);
        tracing::info!(
            broadcaster_id = %broadcaster_id,
            game = %info.game_name,
            title = %info.title,
            "Channel tracking started"
        );

        Ok(Self {
            broadcaster_id,
            state: TrackedState {
                game_name: info.game_name,
                title: info.title,
                game_changed_at: stamp,
                title_changed_at: stamp,
            },
            settings,
            channel,
            history,
            chat,
            clock,
        })
    }

    pub fn broadcaster_id(&self) -> &str {
        &self.broadcaster_id
    }

    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    /// Current game as reported by Twitch, or [`NO_GAME_LABEL`].
    pub async fn current_game(&self) -> Result<String, BotError> {
        let info = self.channel.fetch_channel_info().await?;
        if info.game_name.is_empty() {
            Ok(NO_GAME_LABEL.to_string())
        } else {
            Ok(info.game_name)
        }
    }

    /// Current title as reported by Twitch.
    pub async fn current_title(&self) -> Result<String, BotError> {
        Ok(self.channel.fetch_channel_info().await?.title)
    }

    /// Switch the game. `clear` removes the category without a lookup.
    pub async fn set_game(&mut self, query: &str) -> Result<GameChange, BotError> {
        let query = query.trim();
        if query.eq_ignore_ascii_case(CLEAR_KEYWORD) {
            self.state.game_changed_at = self.clock.now();
            self.channel
                .modify_channel(ChannelChange {
                    game_id: Some(UNCATEGORIZED_GAME_ID.to_string()),
                    title: None,
                })
                .await?;
            return Ok(GameChange::Cleared);
        }

        let name = resolve_game_synonym(query);
        let Some(game) = self
            .channel
            .search_games(&[name.to_string()])
            .await?
            .into_iter()
            .next()
        else {
            tracing::debug!(query, "No game matched");
            return Ok(GameChange::NotFound);
        };

        self.state.game_changed_at = self.clock.now();
        self.channel
            .modify_channel(ChannelChange {
                game_id: Some(game.id),
                title: None,
            })
            .await?;
        Ok(GameChange::Changed { name: game.name })
    }

    /// Set the title. Shared by plain `title`, `title set` and `title restore`.
    pub async fn set_title(&mut self, title: &str) -> Result<(), BotError> {
        self.state.title_changed_at = self.clock.now();
        self.channel
            .modify_channel(ChannelChange {
                game_id: None,
                title: Some(title.to_string()),
            })
            .await
    }

    /// Re-apply the `offset`-th most recent past title (1 = previous).
    ///
    /// Returns the applied title, or `None` when history has no such row.
    pub async fn restore_title(&mut self, offset: u32) -> Result<Option<String>, BotError> {
        if offset == 0 {
            return Ok(None);
        }
        let Some(title) = self.history.query_titles(1, offset).await?.into_iter().next() else {
            return Ok(None);
        };
        self.set_title(&title).await?;
        Ok(Some(title))
    }

    /// Up to `count` past titles, newest first, excluding the current one.
    pub async fn title_history(&self, count: u32) -> Result<Vec<String>, BotError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.history.query_titles(count, 1).await
    }

    /// Reconcile a `channel.update` notification.
    ///
    /// Tracked game and title are overwritten even when announcing or
    /// recording fails; the first such error is returned afterwards.
    pub async fn on_channel_update(&mut self, update: ChannelUpdate) -> Result<UpdateOutcome, BotError> {
        let now = self.clock.now();
        let result = self.reconcile(&update, now).await;
        self.state.game_name = update.game_name;
        self.state.title = update.title;
        result
    }

    /// Every step runs even if an earlier one failed; the first error wins.
    async fn reconcile(&self, update: &ChannelUpdate, now: DateTime<Utc>) -> Result<UpdateOutcome, BotError> {
        let mut outcome = UpdateOutcome::default();
        let mut first_error = None;
        let game_differs = update.game_name != self.state.game_name;
        let title_differs = update.title != self.state.title;

        if game_differs && now - self.state.game_changed_at > self.settings.echo_window {
            match self
                .announce(&format!("Game was changed to \"{}\"", update.game_name))
                .await
            {
                Ok(()) => outcome.announced_game = true,
                Err(e) => {
                    tracing::warn!("Game change announcement failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        if title_differs && now - self.state.title_changed_at > self.settings.echo_window {
            match self
                .announce(&format!("Title was changed to \"{}\"", update.title))
                .await
            {
                Ok(()) => outcome.announced_title = true,
                Err(e) => {
                    tracing::warn!("Title change announcement failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        if title_differs {
            match self.history.upsert_title(&update.title, now).await {
                Ok(()) => outcome.recorded_title = true,
                Err(e) => {
                    tracing::warn!("Recording title history failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::debug!(
            game = %update.game_name,
            title = %update.title,
            ?outcome,
            "Channel update reconciled"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    async fn announce(&self, text: &str) -> Result<(), BotError> {
        self.chat.send_chat_message(&self.broadcaster_id, text).await
    }

    /// Drop history rows older than the retention window. Returns rows removed.
    pub async fn on_stream_offline(&self) -> Result<usize, BotError> {
        let cutoff = self.clock.now() - self.settings.history_retention;
        let removed = self.history.delete_titles_older_than(cutoff).await?;
        tracing::info!(removed, %cutoff, "Pruned title history");
        Ok(removed)
    }
}

/// Map chat shorthands (`dota`, `er`) to full category names.
pub fn resolve_game_synonym(query: &str) -> &str {
    GAME_SYNONYMS
        .iter()
        .find(|(short, _)| short.eq_ignore_ascii_case(query))
        .map(|(_, full)| *full)
        .unwrap_or(query)
}
