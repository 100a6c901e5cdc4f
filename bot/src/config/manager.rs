//! SettingsManager: DB-backed settings with defaults, env migration, and feature status.

use bot_db::Database;
use bot_db::tokens::TokenRole;

use super::FeatureStatus;
use super::defaults::{DEFAULT_SETTINGS, ordered_keys};
use super::validation::validate_setting;

/// A setting row prepared for display; secrets are masked.
#[derive(Debug, Clone)]
pub struct SettingLine {
    pub key: &'static str,
    pub value: String,
    pub description: &'static str,
}

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a setting value. Falls back to default if not in DB.
    pub fn get_setting(&self, key: &str) -> Result<String, anyhow::Error> {
        if let Some(val) = self.db.get_setting(key)? {
            return Ok(val);
        }
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            return Ok(def.default.to_string());
        }
        anyhow::bail!("setting not found: {key}");
    }

    /// Set a setting value with validation.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        let def = DEFAULT_SETTINGS
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("unknown setting key: {key}"))?;

        validate_setting(key, value)
            .map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;

        self.db.set_setting(key, value, setting_type(def.secret))?;
        Ok(())
    }

    /// All known settings with their current values, secrets masked.
    pub fn list_settings(&self) -> Result<Vec<SettingLine>, anyhow::Error> {
        ordered_keys()
            .map(|key| {
                let def = &DEFAULT_SETTINGS[key];
                let value = self.get_setting(key)?;
                let value = if def.secret && !value.is_empty() {
                    "********".to_string()
                } else {
                    value
                };
                Ok(SettingLine {
                    key: def.key,
                    value,
                    description: def.description,
                })
            })
            .collect()
    }

    /// Initialize default settings in DB (skip existing).
    pub fn initialize_defaults(&self) -> Result<(), anyhow::Error> {
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            self.db.set_setting(key, def.default, setting_type(def.secret))?;
        }
        Ok(())
    }

    /// Copy settings from environment variables into the DB (only keys not stored yet).
    pub fn migrate_from_env(&self) -> Result<u32, anyhow::Error> {
        let mut migrated = 0u32;
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            let Ok(env_val) = std::env::var(key) else {
                continue;
            };
            if env_val.is_empty() {
                continue;
            }
            if let Err(e) = validate_setting(key, &env_val) {
                tracing::warn!("Ignoring invalid {key} from env: {e}");
                continue;
            }
            self.db.set_setting(key, &env_val, setting_type(def.secret))?;
            tracing::info!("Migrated setting from env: {key}");
            migrated += 1;
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
            if std::env::var("CLIENT_SECRET").is_ok_and(|v| !v.is_empty()) {
                tracing::warn!(
                    "SECURITY WARNING: CLIENT_SECRET is set in the environment. \
                     Remove it from .env after confirming migration."
                );
            }
        }
        Ok(migrated)
    }

    /// Check whether the Twitch side of the bot can run.
    pub fn check_feature_status(&self) -> Result<FeatureStatus, anyhow::Error> {
        let mut status = FeatureStatus {
            twitch_configured: true,
            ..FeatureStatus::default()
        };

        for def in DEFAULT_SETTINGS.values().filter(|def| def.required) {
            if self.get_setting(def.key)?.is_empty() {
                status.missing_settings.push(def.key.to_string());
                status.twitch_configured = false;
            }
        }
        status.missing_settings.sort();

        status.token_present = self
            .db
            .get_latest_token(TokenRole::Broadcaster)?
            .is_some_and(|t| !t.access_token.is_empty());
        if !status.token_present {
            status
                .warnings
                .push("No OAuth token stored; run `twitch-bot auth-url` then `twitch-bot auth <code>`".into());
        } else if self.db.get_latest_token(TokenRole::Bot)?.is_none() {
            status
                .warnings
                .push("No bot token stored; chat uses the broadcaster account".into());
        }
        if self.get_setting("ECHO_SUPPRESSION_SECS")? == "0" {
            status
                .warnings
                .push("ECHO_SUPPRESSION_SECS is 0 - the bot will announce its own changes".into());
        }

        Ok(status)
    }
}

fn setting_type(secret: bool) -> &'static str {
    if secret { "secret" } else { "normal" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SettingsManager {
        SettingsManager::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn defaults_are_returned_until_set() {
        let sm = manager();
        assert_eq!(sm.get_setting("COMMAND_PREFIX").unwrap(), "!");
        sm.set_setting("COMMAND_PREFIX", "?").unwrap();
        assert_eq!(sm.get_setting("COMMAND_PREFIX").unwrap(), "?");
    }

    #[test]
    fn invalid_and_unknown_settings_are_rejected() {
        let sm = manager();
        assert!(sm.set_setting("ECHO_SUPPRESSION_SECS", "forever").is_err());
        assert!(sm.set_setting("NOT_A_SETTING", "1").is_err());
        assert!(sm.get_setting("NOT_A_SETTING").is_err());
    }

    #[test]
    fn secrets_are_masked_in_listing() {
        let sm = manager();
        sm.set_setting("CLIENT_SECRET", "hunter2").unwrap();
        let lines = sm.list_settings().unwrap();
        let secret = lines.iter().find(|l| l.key == "CLIENT_SECRET").unwrap();
        assert_eq!(secret.value, "********");
        assert_eq!(lines[0].key, "CLIENT_ID");
    }

    #[test]
    fn feature_status_reports_missing_settings_and_token() {
        let sm = manager();
        sm.initialize_defaults().unwrap();
        let status = sm.check_feature_status().unwrap();
        assert!(!status.twitch_configured);
        assert!(!status.token_present);
        assert_eq!(
            status.missing_settings,
            vec!["CLIENT_ID", "CLIENT_SECRET", "TWITCH_USER_ID"]
        );

        sm.set_setting("CLIENT_ID", "cid").unwrap();
        sm.set_setting("CLIENT_SECRET", "secret").unwrap();
        sm.set_setting("TWITCH_USER_ID", "100").unwrap();
        assert!(sm.check_feature_status().unwrap().twitch_configured);
    }

    #[test]
    fn missing_bot_token_is_a_warning_only() {
        let sm = manager();
        let token = bot_db::tokens::Token {
            user_id: "100".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            scope: String::new(),
            expires_at: 0,
        };
        sm.db.save_token(TokenRole::Broadcaster, &token).unwrap();

        let status = sm.check_feature_status().unwrap();
        assert!(status.token_present);
        assert!(status.warnings.iter().any(|w| w.contains("No bot token")));

        sm.db.save_token(TokenRole::Bot, &token).unwrap();
        let status = sm.check_feature_status().unwrap();
        assert!(!status.warnings.iter().any(|w| w.contains("No bot token")));
    }
}
