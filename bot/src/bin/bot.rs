//! Bot binary.
//!
//! `twitch-bot` runs the bot until Ctrl+C. Maintenance subcommands:
//! `auth-url`, `auth <code>` (broadcaster token), `auth-bot <code>` (chat
//! account token), `set <KEY> <VALUE>`, `settings`.

use anyhow::{Context, bail};
use bot_db::tokens::TokenRole;
use tracing_subscriber::EnvFilter;
use twitch_client::auth::TwitchAuth;

use twitch_bot_lib::app::SharedState;
use twitch_bot_lib::background;
use twitch_bot_lib::config::{AppConfig, SettingsManager};
use twitch_bot_lib::shutdown;
use twitch_bot_lib::twitch::stored_token;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (db, config, dir) = twitch_bot_lib::init_foundation()?;

    match args.first().map(String::as_str) {
        None | Some("run") => {}
        Some("auth-url") => {
            println!("{}", auth_client(&config)?.get_auth_url()?);
            return Ok(());
        }
        Some(command @ ("auth" | "auth-bot")) => {
            let role = if command == "auth" {
                TokenRole::Broadcaster
            } else {
                TokenRole::Bot
            };
            let code = args
                .get(1)
                .with_context(|| format!("usage: twitch-bot {command} <code>"))?;
            let token = auth_client(&config)?.exchange_code(code).await?;
            db.save_token(role, &stored_token(token, String::new()))?;
            println!(
                "{} token saved. The token owner is resolved on the next run.",
                role.as_str()
            );
            return Ok(());
        }
        Some("set") => {
            let (Some(key), Some(value)) = (args.get(1), args.get(2)) else {
                bail!("usage: twitch-bot set <KEY> <VALUE>");
            };
            SettingsManager::new(db).set_setting(key, value)?;
            println!("{key} updated.");
            return Ok(());
        }
        Some("settings") => {
            for line in SettingsManager::new(db).list_settings()? {
                println!("{:<30} {:<24} {}", line.key, line.value, line.description);
            }
            return Ok(());
        }
        Some(other) => bail!("unknown command: {other}"),
    }

    tracing::info!(data_dir = %dir.display(), "Starting twitch-bot");
    let state = SharedState::new(db, config);

    let s = state.clone();
    tokio::spawn(async move { background::token_refresh_loop(s).await });

    let s = state.clone();
    let eventsub_handle = tokio::spawn(async move { twitch_bot_lib::run_eventsub_handler(s).await });

    tracing::info!("Bot running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&state).await;
    eventsub_handle.abort();
    Ok(())
}

fn auth_client(config: &AppConfig) -> anyhow::Result<TwitchAuth> {
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        bail!("CLIENT_ID and CLIENT_SECRET must be set first (twitch-bot set CLIENT_ID ...)");
    }
    Ok(TwitchAuth::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.redirect_uri.clone(),
    ))
}
