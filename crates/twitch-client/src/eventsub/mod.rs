//! EventSub WebSocket client for real-time Twitch events.
//!
//! Connects to wss://eventsub.wss.twitch.tv/ws, handles welcome/keepalive/
//! notification messages, and manages automatic reconnection with
//! exponential backoff.

mod connection;
pub mod events;

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::{Token, TwitchError};

const EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(30);
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const FAILURE_RESET_WINDOW: Duration = Duration::from_secs(5 * 60);
const MAX_CONSECUTIVE_FAILURES_BEFORE_RESTART: u32 = 8;

/// Event types the bot subscribes to.
pub const EVENT_CHANNEL_UPDATE: &str = "channel.update";
pub const EVENT_STREAM_ONLINE: &str = "stream.online";
pub const EVENT_STREAM_OFFLINE: &str = "stream.offline";
pub const EVENT_CHAT_MESSAGE: &str = "channel.chat.message";

/// An event received from EventSub.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventSubEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// One subscription: an event type scoped to a broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub event_type: String,
    pub broadcaster_user_id: String,
}

impl Subscription {
    pub fn new(event_type: &str, broadcaster_user_id: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            broadcaster_user_id: broadcaster_user_id.to_string(),
        }
    }
}

/// EventSub WebSocket client configuration.
pub struct EventSubConfig {
    pub client_id: String,
    pub token: Token,
    /// User whose token is used; chat subscriptions read chat as this user.
    pub bot_user_id: String,
    pub subscriptions: Vec<Subscription>,
}

impl EventSubConfig {
    /// Channel updates, stream status and chat for the home channel, plus
    /// chat for every extra joined channel.
    pub fn for_bot(
        client_id: String,
        token: Token,
        broadcaster_user_id: &str,
        bot_user_id: String,
        joined_channel_ids: &[String],
    ) -> Self {
        let mut subscriptions = vec![
            Subscription::new(EVENT_CHANNEL_UPDATE, broadcaster_user_id),
            Subscription::new(EVENT_STREAM_ONLINE, broadcaster_user_id),
            Subscription::new(EVENT_STREAM_OFFLINE, broadcaster_user_id),
            Subscription::new(EVENT_CHAT_MESSAGE, broadcaster_user_id),
        ];
        for channel_id in joined_channel_ids {
            if channel_id.is_empty() || channel_id == broadcaster_user_id {
                continue;
            }
            subscriptions.push(Subscription::new(EVENT_CHAT_MESSAGE, channel_id));
        }

        Self {
            client_id,
            token,
            bot_user_id,
            subscriptions,
        }
    }
}

/// EventSub WebSocket client with auto-reconnect.
///
/// Events are delivered via `mpsc::Receiver<EventSubEvent>`.
pub struct EventSubClient;

impl EventSubClient {
    /// Start the EventSub loop. Returns an event receiver and shutdown sender.
    pub async fn connect(
        config: EventSubConfig,
    ) -> Result<(mpsc::Receiver<EventSubEvent>, mpsc::Sender<()>), TwitchError> {
        let (event_tx, event_rx) = mpsc::channel::<EventSubEvent>(256);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(Self::run_loop(config, event_tx, shutdown_rx));
        Ok((event_rx, shutdown_tx))
    }

    async fn run_loop(
        config: EventSubConfig,
        event_tx: mpsc::Sender<EventSubEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut failures: u32 = 0;
        let mut last_failure_at: Option<Instant> = None;
        let mut ws_url = EVENTSUB_URL.to_string();
        loop {
            if shutdown_rx.try_recv().is_ok() {
                tracing::info!("EventSub shutdown requested");
                return;
            }
            if last_failure_at.is_some_and(|at| at.elapsed() >= FAILURE_RESET_WINDOW) {
                tracing::info!(failures, "EventSub failures reset after stable interval");
                failures = 0;
                last_failure_at = None;
            }
            match Self::connect_once(&config, &ws_url, &event_tx, &mut shutdown_rx).await {
                Ok(Some(next_url)) => {
                    failures = 0;
                    ws_url = next_url;
                    tracing::info!(ws_url = %ws_url, "EventSub reconnect URL accepted");
                }
                Ok(None) => {
                    tracing::info!("EventSub connection closed cleanly");
                    return;
                }
                Err(e) => {
                    if Self::is_auth_error(&e) {
                        tracing::warn!(
                            error = %e,
                            "EventSub rejected the token; stopping so the caller can reload it"
                        );
                        return;
                    }
                    failures += 1;
                    last_failure_at = Some(Instant::now());
                    if ws_url != EVENTSUB_URL {
                        tracing::warn!("EventSub reconnect URL failed, falling back to default URL");
                        ws_url = EVENTSUB_URL.to_string();
                    }
                    if failures >= MAX_CONSECUTIVE_FAILURES_BEFORE_RESTART {
                        tracing::warn!(
                            failures,
                            "EventSub failures exceeded threshold; handing control back to caller"
                        );
                        return;
                    }
                    let backoff = Self::backoff_duration(failures);
                    tracing::warn!(
                        error = %e, attempt = failures,
                        backoff_secs = backoff.as_secs(),
                        "EventSub connection failed, will reconnect"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("EventSub shutdown requested during reconnect backoff");
                            return;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    fn backoff_duration(failures: u32) -> Duration {
        let d = BASE_BACKOFF * 2u32.saturating_pow(failures.saturating_sub(1));
        d.min(MAX_BACKOFF)
    }

    fn is_auth_error(error: &TwitchError) -> bool {
        matches!(
            error,
            TwitchError::ApiError {
                status: 401 | 403,
                ..
            } | TwitchError::AuthRequired
        )
    }
}
