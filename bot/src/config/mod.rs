//! Configuration management: defaults, validation, loading from DB + environment.

pub mod app_config;
pub mod defaults;
pub mod manager;
pub mod validation;

pub use app_config::AppConfig;
pub use manager::SettingsManager;

/// Which parts of the bot are usable with the current settings.
#[derive(Debug, Clone, Default)]
pub struct FeatureStatus {
    pub twitch_configured: bool,
    pub token_present: bool,
    pub missing_settings: Vec<String>,
    pub warnings: Vec<String>,
}
