//! Runtime application configuration loaded from DB + environment overrides.

use super::manager::SettingsManager;
use crate::tracker::TrackerSettings;

/// Runtime configuration populated from the settings DB.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Home channel; its broadcaster also owns the bot.
    pub twitch_user_id: String,
    /// Explicit chat identity. Empty means "whoever the token belongs to".
    pub bot_user_id: String,
    pub redirect_uri: String,
    pub command_prefix: String,
    pub echo_suppression_secs: u32,
    pub title_history_retention_days: u32,
    pub announce_on_ready: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            twitch_user_id: String::new(),
            bot_user_id: String::new(),
            redirect_uri: "http://localhost:3000".into(),
            command_prefix: "!".into(),
            echo_suppression_secs: 15,
            title_history_retention_days: 30,
            announce_on_ready: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> String { sm.get_setting(key).unwrap_or_default() };
        let defaults = Self::default();

        // Quick toggle for local restarts without touching the DB.
        let announce_on_ready = std::env::var("ANNOUNCE_ON_READY")
            .map(|v| v == "true")
            .unwrap_or_else(|_| g("ANNOUNCE_ON_READY") != "false");

        Ok(Self {
            client_id: g("CLIENT_ID"),
            client_secret: g("CLIENT_SECRET"),
            twitch_user_id: g("TWITCH_USER_ID"),
            bot_user_id: g("BOT_USER_ID"),
            redirect_uri: non_empty_or(g("REDIRECT_URI"), defaults.redirect_uri),
            command_prefix: non_empty_or(g("COMMAND_PREFIX"), defaults.command_prefix),
            echo_suppression_secs: g("ECHO_SUPPRESSION_SECS")
                .parse()
                .unwrap_or(defaults.echo_suppression_secs),
            title_history_retention_days: g("TITLE_HISTORY_RETENTION_DAYS")
                .parse()
                .ok()
                .filter(|days| *days > 0)
                .unwrap_or(defaults.title_history_retention_days),
            announce_on_ready,
        })
    }

    /// Reload config from the settings manager.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), anyhow::Error> {
        *self = Self::load(sm)?;
        Ok(())
    }

    pub fn twitch_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.twitch_user_id.is_empty()
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            echo_window: chrono::Duration::seconds(i64::from(self.echo_suppression_secs)),
            history_retention: chrono::Duration::days(i64::from(self.title_history_retention_days)),
        }
    }
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.trim().is_empty() { fallback } else { value }
}
