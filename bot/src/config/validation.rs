//! Setting value validation.

use std::sync::LazyLock;

use regex::Regex;

static RE_USER_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{1,20}$").unwrap());
static RE_HTTP_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://\S+$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "TWITCH_USER_ID" | "BOT_USER_ID" => {
            if !value.is_empty() && !RE_USER_ID.is_match(value) {
                return Err("must be a numeric Twitch user id".into());
            }
        }
        "REDIRECT_URI" => {
            if !RE_HTTP_URL.is_match(value) {
                return Err("must be an http(s) URL".into());
            }
        }
        "COMMAND_PREFIX" => {
            if value.is_empty() || value.chars().count() > 3 || value.chars().any(char::is_whitespace)
            {
                return Err("must be 1-3 non-whitespace characters".into());
            }
        }
        "ECHO_SUPPRESSION_SECS" => validate_int_range(value, 0, 300)?,
        "TITLE_HISTORY_RETENTION_DAYS" => validate_int_range(value, 1, 3650)?,
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "ANNOUNCE_ON_READY")
}
