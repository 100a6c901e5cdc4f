use bot_db::DbError;
use twitch_client::TwitchError;

/// Errors surfaced by the bot's handlers.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Twitch: {0}")]
    Twitch(#[from] TwitchError),

    #[error("Database: {0}")]
    Db(#[from] DbError),

    #[error("No OAuth token stored; run `twitch-bot auth <code>` first")]
    NoToken,
}
