//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, bool, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("CLIENT_ID", "", false, true, "Twitch application client id"),
    ("CLIENT_SECRET", "", true, true, "Twitch application client secret"),
    (
        "TWITCH_USER_ID",
        "",
        false,
        true,
        "Home channel (broadcaster) user id; also the bot owner",
    ),
    (
        "BOT_USER_ID",
        "",
        false,
        false,
        "User id the bot chats as; empty = the token's user",
    ),
    (
        "REDIRECT_URI",
        "http://localhost:3000",
        false,
        false,
        "OAuth redirect URI registered for the application",
    ),
    ("COMMAND_PREFIX", "!", false, false, "Chat command prefix"),
    (
        "ECHO_SUPPRESSION_SECS",
        "15",
        false,
        false,
        "Seconds after a bot-made change during which matching channel updates are not announced",
    ),
    (
        "TITLE_HISTORY_RETENTION_DAYS",
        "30",
        false,
        false,
        "Titles older than this are pruned when the stream goes offline",
    ),
    (
        "ANNOUNCE_ON_READY",
        "true",
        false,
        false,
        "Post a message to the home channel when the bot starts",
    ),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub required: bool,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Setting keys in declaration order, for listing.
pub fn ordered_keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter().map(|def| def.0)
}
