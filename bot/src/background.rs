//! Background task loops: OAuth token refresh for the broadcaster and bot tokens.

use std::time::Duration;

use bot_db::tokens::TokenRole;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use twitch_client::auth::{TwitchAuth, needs_refresh};

use crate::app::SharedState;
use crate::twitch::{client_token, stored_token};

const CHECK_INTERVAL_SECS: u64 = 30 * 60;
const INITIAL_BACKOFF_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 30 * 60;

pub(crate) async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshStep {
    /// Nothing to do until the next regular check.
    Idle,
    Refreshed,
    Failed,
}

impl RefreshStep {
    /// Combine the outcome of two tokens: any failure wins.
    fn merge(self, other: RefreshStep) -> RefreshStep {
        match (self, other) {
            (RefreshStep::Failed, _) | (_, RefreshStep::Failed) => RefreshStep::Failed,
            (RefreshStep::Refreshed, _) | (_, RefreshStep::Refreshed) => RefreshStep::Refreshed,
            _ => RefreshStep::Idle,
        }
    }
}

/// Periodically check and refresh the stored Twitch OAuth tokens.
pub async fn token_refresh_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();
    let mut failure_backoff_secs = INITIAL_BACKOFF_SECS;

    loop {
        let wait_secs = match refresh_once(&state).await {
            RefreshStep::Idle | RefreshStep::Refreshed => {
                failure_backoff_secs = INITIAL_BACKOFF_SECS;
                CHECK_INTERVAL_SECS
            }
            RefreshStep::Failed => {
                let wait = failure_backoff_secs;
                tracing::warn!(
                    retry_after_secs = wait,
                    "Retrying token refresh with exponential backoff"
                );
                failure_backoff_secs = (failure_backoff_secs * 2).min(MAX_BACKOFF_SECS);
                wait
            }
        };

        if sleep_or_cancel(&shutdown_token, Duration::from_secs(wait_secs)).await {
            tracing::info!("Token refresh loop stopped (shutdown)");
            return;
        }
    }
}

async fn refresh_once(state: &SharedState) -> RefreshStep {
    let (client_id, client_secret, redirect_uri) = {
        let config = state.config().await;
        (
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
        )
    };
    if client_id.is_empty() || client_secret.is_empty() {
        return RefreshStep::Idle;
    }
    let auth = TwitchAuth::new(client_id, client_secret, redirect_uri);

    let mut step = RefreshStep::Idle;
    for role in TokenRole::ALL {
        step = step.merge(refresh_role(state, &auth, role).await);
    }
    step
}

async fn refresh_role(state: &SharedState, auth: &TwitchAuth, role: TokenRole) -> RefreshStep {
    let db_token = match state.db().get_latest_token(role) {
        Ok(Some(token)) => token,
        Ok(None) => {
            // The bot token is optional; chat falls back to the broadcaster token.
            if role == TokenRole::Broadcaster {
                match auth.get_auth_url() {
                    Ok(url) => tracing::warn!(
                        "No broadcaster token stored. Authorize at {url} and run `twitch-bot auth <code>`"
                    ),
                    Err(e) => tracing::error!("Failed to build auth URL: {e}"),
                }
            }
            return RefreshStep::Idle;
        }
        Err(e) => {
            tracing::error!(role = role.as_str(), "Failed to load token: {e}");
            return RefreshStep::Failed;
        }
    };

    let mut user_id = db_token.user_id.clone();
    let mut token = client_token(db_token);

    let now = chrono::Utc::now().timestamp();
    let refreshed = needs_refresh(&token, now);
    if refreshed {
        tracing::info!(
            role = role.as_str(),
            time_until_expiry = token.expires_at - now,
            "Token expiring soon or expired, refreshing"
        );
        match auth.refresh_token(&token.refresh_token).await {
            Ok(new_token) => token = new_token,
            Err(e) => {
                tracing::error!(role = role.as_str(), "Token auto-refresh failed: {e}");
                return RefreshStep::Failed;
            }
        }
    }

    let mut resolved_user = false;
    if user_id.is_empty() {
        match state.api().get_current_user(&token).await {
            Ok(user) => {
                tracing::info!(
                    role = role.as_str(),
                    user_id = %user.id,
                    login = %user.login,
                    "Token owner resolved"
                );
                user_id = user.id;
                resolved_user = true;
            }
            Err(e) => tracing::warn!("Failed to resolve token owner: {e}"),
        }
    }

    if !refreshed && !resolved_user {
        return RefreshStep::Idle;
    }

    let expires_at = token.expires_at;
    if let Err(e) = state.db().save_token(role, &stored_token(token, user_id)) {
        tracing::error!("Failed to save token: {e}");
        return RefreshStep::Failed;
    }
    if refreshed {
        tracing::info!(role = role.as_str(), expires_at, "Token auto-refreshed successfully");
        RefreshStep::Refreshed
    } else {
        RefreshStep::Idle
    }
}
