//! Game and title commands for the home channel.

use super::CommandContext;
use crate::error::BotError;
use crate::formats::ordinal;
use crate::tracker::{ChannelTracker, GameChange, NO_GAME_LABEL};

const DEFAULT_RESTORE_OFFSET: u32 = 1;
const DEFAULT_HISTORY_COUNT: u32 = 3;

pub const GAME_MODERATORS_ONLY: &str = "Only moderators are allowed to change game name";
pub const TITLE_MODERATORS_ONLY: &str = "Only moderators are allowed to change title";
pub const GAME_NOT_FOUND: &str = "Couldn't find any games with such a name";
pub const NO_SUCH_TITLE: &str = "No change: the database doesn't keep such title.";
pub const HISTORY_EMPTY: &str = "Database doesn't have any titles saved.";

/// `game` with no argument shows the current game; with one, changes it.
pub async fn game(
    tracker: &mut ChannelTracker,
    ctx: &CommandContext,
    rest: &str,
) -> Result<Vec<String>, BotError> {
    if rest.is_empty() {
        return Ok(vec![tracker.current_game().await?]);
    }
    if !ctx.is_moderator {
        return Ok(vec![GAME_MODERATORS_ONLY.to_string()]);
    }

    let reply = match tracker.set_game(rest).await? {
        GameChange::Cleared => format!("Set game to \"{NO_GAME_LABEL}\""),
        GameChange::Changed { name } => format!("Changed game to \"{name}\""),
        GameChange::NotFound => GAME_NOT_FOUND.to_string(),
    };
    Ok(vec![reply])
}

/// `title`, `title <text>`, `title set <text>`, `title restore [offset]`
/// (also `prev` / `previous`) and `title history [count]`.
pub async fn title(
    tracker: &mut ChannelTracker,
    ctx: &CommandContext,
    prefix: &str,
    rest: &str,
) -> Result<Vec<String>, BotError> {
    if rest.is_empty() {
        return Ok(vec![tracker.current_title().await?]);
    }
    if !ctx.is_moderator {
        return Ok(vec![TITLE_MODERATORS_ONLY.to_string()]);
    }

    let (sub, args) = match rest.split_once(char::is_whitespace) {
        Some((sub, args)) => (sub, args.trim()),
        None => (rest, ""),
    };

    match sub.to_lowercase().as_str() {
        "set" => {
            if args.is_empty() {
                return Ok(vec![format!("Usage: {prefix}title set <text>")]);
            }
            tracker.set_title(args).await?;
            Ok(vec![format!("Set title to \"{args}\"")])
        }
        "restore" | "prev" | "previous" => {
            let Some(offset) = parse_positive(args, DEFAULT_RESTORE_OFFSET) else {
                return Ok(vec![format!("Usage: {prefix}title restore [offset]")]);
            };
            match tracker.restore_title(offset).await? {
                Some(title) => Ok(vec![format!(
                    "Set the title to {} in history: {title}",
                    ordinal(offset)
                )]),
                None => Ok(vec![NO_SUCH_TITLE.to_string()]),
            }
        }
        "history" => {
            let Some(count) = parse_positive(args, DEFAULT_HISTORY_COUNT) else {
                return Ok(vec![format!("Usage: {prefix}title history [count]")]);
            };
            let titles = tracker.title_history(count).await?;
            if titles.is_empty() {
                return Ok(vec![HISTORY_EMPTY.to_string()]);
            }
            Ok(titles
                .iter()
                .enumerate()
                .map(|(i, title)| format!("{}. {title}", i + 1))
                .collect())
        }
        _ => {
            tracker.set_title(rest).await?;
            Ok(vec![format!("Changed title to \"{rest}\"")])
        }
    }
}

/// Parse a 1-based count/offset; empty input yields `default`.
fn parse_positive(args: &str, default: u32) -> Option<u32> {
    let Some(first) = args.split_whitespace().next() else {
        return Some(default);
    };
    first.parse::<u32>().ok().filter(|n| *n > 0)
}
