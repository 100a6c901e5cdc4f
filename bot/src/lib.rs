pub mod app;
pub mod background;
pub mod commands;
pub mod config;
pub mod error;
pub mod eventsub_handler;
pub mod formats;
pub mod shutdown;
pub mod tracker;
pub mod twitch;

use std::path::PathBuf;

use bot_db::Database;
use bot_db::tokens::TokenRole;

use config::{AppConfig, SettingsManager};

pub use eventsub_handler::run as run_eventsub_handler;

/// Determine the data directory for the bot.
/// Priority: TWITCH_BOT_DATA_DIR env var > ~/.twitch-bot
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TWITCH_BOT_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".twitch-bot")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Seed the token table from the environment for every role that has no token.
///
/// `ACCESS_TOKEN`/`REFRESH_TOKEN` seed the broadcaster token and
/// `BOT_ACCESS_TOKEN`/`BOT_REFRESH_TOKEN` the bot token. Seeded tokens have
/// no known expiry, so the refresh loop renews them first.
fn seed_tokens_from_env(db: &Database) -> Result<usize, anyhow::Error> {
    let mut seeded = 0;
    for (role, prefix) in [(TokenRole::Broadcaster, ""), (TokenRole::Bot, "BOT_")] {
        if db.get_latest_token(role)?.is_some() {
            continue;
        }
        let access_token = std::env::var(format!("{prefix}ACCESS_TOKEN")).unwrap_or_default();
        let refresh_token = std::env::var(format!("{prefix}REFRESH_TOKEN")).unwrap_or_default();
        if access_token.is_empty() && refresh_token.is_empty() {
            continue;
        }
        db.save_token(
            role,
            &bot_db::tokens::Token {
                user_id: String::new(),
                access_token,
                refresh_token,
                scope: twitch_client::SCOPES.join(" "),
                expires_at: 0,
            },
        )?;
        tracing::info!(role = role.as_str(), "Seeded OAuth token from environment");
        seeded += 1;
    }
    Ok(seeded)
}

/// Initialize DB, migrate settings, load config.
pub fn init_foundation() -> Result<(Database, AppConfig, PathBuf), anyhow::Error> {
    load_dotenv();

    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join("bot.db");

    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    let sm = SettingsManager::new(db.clone());

    // Migrate settings from environment variables (one-time)
    if let Err(e) = sm.migrate_from_env() {
        tracing::error!("Failed to migrate from env: {e}");
    }

    sm.initialize_defaults()?;

    if let Err(e) = seed_tokens_from_env(&db) {
        tracing::error!("Failed to seed tokens from env: {e}");
    }

    let config = AppConfig::load(&sm)?;

    if let Ok(status) = sm.check_feature_status() {
        if !status.missing_settings.is_empty() || !status.warnings.is_empty() {
            tracing::warn!(
                "Missing settings: {:?}, warnings: {:?}",
                status.missing_settings,
                status.warnings
            );
        }
    }

    tracing::info!(prefix = %config.command_prefix, "Settings loaded");
    Ok((db, config, dir))
}
