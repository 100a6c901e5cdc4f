//! EventSub event handler: owns the channel tracker and the command router.
//!
//! Waits for configuration and a token, starts tracking the home channel,
//! then connects to EventSub and handles events one at a time. Reconnects
//! when the stream ends or the joined channel set changes.

use std::sync::Arc;
use std::time::Duration;

use bot_db::tokens::TokenRole;
use tokio::sync::mpsc;
use twitch_client::eventsub::events::{ChannelUpdateEvent, ChatMessageEvent, StreamStatusEvent};
use twitch_client::eventsub::{
    EVENT_CHANNEL_UPDATE, EVENT_CHAT_MESSAGE, EVENT_STREAM_OFFLINE, EVENT_STREAM_ONLINE,
    EventSubClient, EventSubConfig, EventSubEvent,
};

use crate::app::SharedState;
use crate::background::sleep_or_cancel;
use crate::commands::meta::{MetaCommands, READY_MESSAGE};
use crate::commands::{CommandContext, CommandRouter};
use crate::tracker::{ChannelTracker, ChannelUpdate, ChatSender, SystemClock};
use crate::twitch::{
    HelixChannel, HelixChat, HelixUsers, SentMessageLog, load_chat_token, stored_chat_token,
};

const STARTUP_DELAY: Duration = Duration::from_secs(5);
const WAIT_RETRY: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Routes EventSub notifications to the tracker and the command router.
pub(crate) struct Dispatcher {
    router: CommandRouter,
    /// Chat identity used for sending and for the chat subscriptions.
    bot_user_id: String,
    own_messages: Arc<SentMessageLog>,
}

impl Dispatcher {
    pub(crate) fn new(
        router: CommandRouter,
        bot_user_id: String,
        own_messages: Arc<SentMessageLog>,
    ) -> Self {
        Self {
            router,
            bot_user_id,
            own_messages,
        }
    }

    /// Dispatch one EventSub notification.
    pub(crate) async fn handle_event(&mut self, event: &EventSubEvent) {
        match event.event_type.as_str() {
            EVENT_CHAT_MESSAGE => {
                let message: ChatMessageEvent =
                    match serde_json::from_value(event.payload.clone()) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!("Malformed chat message event: {e}");
                            return;
                        }
                    };
                if self.own_messages.take(&message.message_id) {
                    tracing::trace!(message_id = %message.message_id, "Skipping own chat message");
                    return;
                }
                let ctx = CommandContext::from(&message);
                self.router.handle_message(&ctx, &message.message.text).await;
            }
            EVENT_CHANNEL_UPDATE => {
                let update: ChannelUpdateEvent =
                    match serde_json::from_value(event.payload.clone()) {
                        Ok(update) => update,
                        Err(e) => {
                            tracing::warn!("Malformed channel.update event: {e}");
                            return;
                        }
                    };
                if update.broadcaster_user_id != self.router.tracker().broadcaster_id() {
                    return;
                }
                let result = self
                    .router
                    .tracker_mut()
                    .on_channel_update(ChannelUpdate {
                        game_name: update.category_name,
                        title: update.title,
                    })
                    .await;
                if let Err(e) = result {
                    tracing::warn!("Channel update handling failed: {e}");
                }
            }
            EVENT_STREAM_OFFLINE => {
                tracing::info!("Stream went offline");
                if let Err(e) = self.router.tracker().on_stream_offline().await {
                    tracing::warn!("Title history pruning failed: {e}");
                }
            }
            EVENT_STREAM_ONLINE => {
                match serde_json::from_value::<StreamStatusEvent>(event.payload.clone()) {
                    Ok(online) => tracing::info!(
                        broadcaster = %online.broadcaster_user_login,
                        "Stream went online"
                    ),
                    Err(_) => tracing::info!("Stream went online"),
                }
            }
            other => {
                tracing::debug!(event_type = other, "EventSub event received");
            }
        }
    }
}

/// Start the EventSub handler loop. Returns on shutdown.
pub async fn run(state: SharedState) {
    let shutdown = state.shutdown_token().clone();
    if sleep_or_cancel(&shutdown, STARTUP_DELAY).await {
        return;
    }

    let Some(mut dispatcher) = start_dispatcher(&state).await else {
        tracing::info!("EventSub handler stopped (shutdown)");
        return;
    };

    loop {
        let Some(config) = subscription_config(&state, &dispatcher).await else {
            if sleep_or_cancel(&shutdown, WAIT_RETRY).await {
                break;
            }
            continue;
        };

        tracing::info!(
            subscriptions = config.subscriptions.len(),
            "Starting EventSub connection"
        );
        match EventSubClient::connect(config).await {
            Ok((event_rx, stop_tx)) => {
                state.set_eventsub_shutdown(stop_tx).await;
                if !process_events(&state, &mut dispatcher, event_rx).await {
                    break;
                }
            }
            Err(e) => tracing::error!("EventSub connection failed: {e}"),
        }

        if sleep_or_cancel(&shutdown, RECONNECT_DELAY).await {
            break;
        }
    }
    tracing::info!("EventSub handler stopped (shutdown)");
}

/// Build the tracker and router once config and tokens are in place.
/// `None` on shutdown.
async fn start_dispatcher(state: &SharedState) -> Option<Dispatcher> {
    let shutdown = state.shutdown_token().clone();
    loop {
        match try_start_dispatcher(state).await {
            Ok(Some(dispatcher)) => return Some(dispatcher),
            Ok(None) => {}
            Err(e) => tracing::warn!("Channel tracker could not start: {e}"),
        }
        if sleep_or_cancel(&shutdown, WAIT_RETRY).await {
            return None;
        }
    }
}

async fn try_start_dispatcher(state: &SharedState) -> Result<Option<Dispatcher>, anyhow::Error> {
    // Settings may have been edited with `twitch-bot set` while waiting.
    state.reload_config().await?;
    let config = state.config().await.clone();
    if !config.twitch_configured() {
        tracing::debug!("Twitch settings incomplete, waiting");
        return Ok(None);
    }
    let Some(broadcaster_token) = state.db().get_latest_token(TokenRole::Broadcaster)? else {
        tracing::debug!("No broadcaster token yet, waiting");
        return Ok(None);
    };
    if !broadcaster_token.user_id.is_empty() && broadcaster_token.user_id != config.twitch_user_id {
        tracing::warn!(
            token_user_id = %broadcaster_token.user_id,
            twitch_user_id = %config.twitch_user_id,
            "Broadcaster token belongs to another account; channel edits will be rejected"
        );
    }
    let Some(chat_token) = stored_chat_token(state.db())? else {
        return Ok(None);
    };
    let bot_user_id = if config.bot_user_id.is_empty() {
        chat_token.user_id
    } else {
        config.bot_user_id.clone()
    };
    if bot_user_id.is_empty() {
        tracing::debug!("Bot user id unknown yet, waiting");
        return Ok(None);
    }

    let db = state.db().clone();
    let api = state.api().clone();
    let home = config.twitch_user_id.clone();
    let own_messages = Arc::new(SentMessageLog::default());
    let chat: Arc<dyn ChatSender> = Arc::new(HelixChat::new(
        api.clone(),
        db.clone(),
        bot_user_id.clone(),
        own_messages.clone(),
    ));

    let tracker = ChannelTracker::start(
        home.clone(),
        config.tracker_settings(),
        Arc::new(HelixChannel::new(api.clone(), db.clone(), home.clone())),
        Arc::new(db.clone()),
        chat.clone(),
        Arc::new(SystemClock),
    )
    .await?;

    if config.announce_on_ready {
        if let Err(e) = chat.send_chat_message(&home, READY_MESSAGE).await {
            tracing::warn!("Failed to send ready message: {e}");
        }
    }

    let meta = MetaCommands::new(
        Arc::new(HelixUsers::new(api, db)),
        state.db().clone(),
        state.channels_changed().clone(),
    );
    let router = CommandRouter::new(
        config.command_prefix,
        config.twitch_user_id,
        tracker,
        meta,
        chat,
    );
    tracing::info!(bot_user_id = %bot_user_id, "Command router ready");
    Ok(Some(Dispatcher::new(router, bot_user_id, own_messages)))
}

/// EventSub runs on the chat token: chat subscriptions must be authorized by
/// the user that reads chat, and the channel/stream events are public.
async fn subscription_config(state: &SharedState, dispatcher: &Dispatcher) -> Option<EventSubConfig> {
    let token = match load_chat_token(state.db()) {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!("EventSub waiting for token: {e}");
            return None;
        }
    };
    let joined: Vec<String> = match state.db().list_joined_channels() {
        Ok(channels) => channels.into_iter().map(|c| c.user_id).collect(),
        Err(e) => {
            tracing::warn!("Failed to list joined channels: {e}");
            Vec::new()
        }
    };
    let client_id = state.config().await.client_id.clone();

    Some(EventSubConfig::for_bot(
        client_id,
        token,
        dispatcher.router.tracker().broadcaster_id(),
        dispatcher.bot_user_id.clone(),
        &joined,
    ))
}

/// Process events until the stream ends or a resubscribe is requested.
/// Returns `false` on shutdown.
async fn process_events(
    state: &SharedState,
    dispatcher: &mut Dispatcher,
    mut events: mpsc::Receiver<EventSubEvent>,
) -> bool {
    let shutdown = state.shutdown_token().clone();
    let channels_changed = state.channels_changed().clone();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = channels_changed.notified() => {
                tracing::info!("Joined channels changed, resubscribing");
                if let Some(tx) = state.take_eventsub_shutdown().await {
                    let _ = tx.send(()).await;
                }
                return true;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::warn!("EventSub event stream ended, will reconnect");
                    return true;
                };
                dispatcher.handle_event(&event).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::commands::meta::{ChannelUser, UserDirectory};
    use crate::error::BotError;
    use crate::tracker::tests::{Harness, MockChannel, MockChat, harness, t0};

    const HOME: &str = "1000";

    struct OneUser;

    #[async_trait::async_trait]
    impl UserDirectory for OneUser {
        async fn find_user(&self, login: &str) -> Result<Option<ChannelUser>, BotError> {
            Ok((login == "gorgc").then(|| ChannelUser {
                id: "2000".into(),
                login: "gorgc".into(),
            }))
        }
    }

    struct Setup {
        dispatcher: Dispatcher,
        sent: Arc<MockChat>,
        channel: Arc<MockChannel>,
        db: bot_db::Database,
        own_messages: Arc<SentMessageLog>,
    }

    /// `bot_user_id` is the chat identity; `HOME` is both channel and owner.
    async fn setup(bot_user_id: &str) -> Setup {
        let Harness {
            tracker,
            channel,
            chat,
            db,
            ..
        } = harness().await;
        let meta = MetaCommands::new(Arc::new(OneUser), db.clone(), Arc::new(Notify::new()));
        let router = CommandRouter::new("!".into(), HOME.into(), tracker, meta, chat.clone());
        let own_messages = Arc::new(SentMessageLog::default());
        Setup {
            dispatcher: Dispatcher::new(router, bot_user_id.into(), own_messages.clone()),
            sent: chat,
            channel,
            db,
            own_messages,
        }
    }

    fn event(event_type: &str, payload: serde_json::Value) -> EventSubEvent {
        EventSubEvent {
            event_type: event_type.to_string(),
            payload,
        }
    }

    fn chat_event(chatter_id: &str, message_id: &str, text: &str) -> EventSubEvent {
        event(
            EVENT_CHAT_MESSAGE,
            json!({
                "broadcaster_user_id": HOME,
                "broadcaster_user_login": "irene",
                "chatter_user_id": chatter_id,
                "chatter_user_login": "someone",
                "chatter_user_name": "Someone",
                "message_id": message_id,
                "message": { "text": text },
                "badges": [{ "set_id": "moderator", "id": "1" }]
            }),
        )
    }

    #[tokio::test]
    async fn channel_update_reaches_tracker() {
        let mut s = setup("9000").await;
        let update = event(
            EVENT_CHANNEL_UPDATE,
            json!({
                "broadcaster_user_id": HOME,
                "broadcaster_user_login": "irene",
                "title": "New title",
                "category_id": "512953",
                "category_name": "Elden Ring"
            }),
        );
        s.dispatcher.handle_event(&update).await;

        let state = s.dispatcher.router.tracker().state();
        assert_eq!(state.game_name, "Elden Ring");
        assert_eq!(state.title, "New title");
        assert_eq!(
            s.sent.texts(),
            vec![
                "Game was changed to \"Elden Ring\"",
                "Title was changed to \"New title\""
            ]
        );
        assert_eq!(s.db.get_title_edit_time("New title").unwrap(), Some(t0()));
    }

    #[tokio::test]
    async fn foreign_channel_update_is_ignored() {
        let mut s = setup("9000").await;
        let update = event(
            EVENT_CHANNEL_UPDATE,
            json!({ "broadcaster_user_id": "2000", "title": "x", "category_name": "y" }),
        );
        s.dispatcher.handle_event(&update).await;
        assert_eq!(s.dispatcher.router.tracker().state().title, "Current title");
        assert!(s.sent.texts().is_empty());
    }

    #[tokio::test]
    async fn own_messages_are_skipped_by_message_id() {
        let mut s = setup("9000").await;
        s.own_messages.record("sent-by-bot");

        s.dispatcher
            .handle_event(&chat_event("9000", "sent-by-bot", "!mmr"))
            .await;
        assert!(s.sent.texts().is_empty());

        s.dispatcher
            .handle_event(&chat_event("3000", "m-2", "!mmr"))
            .await;
        assert_eq!(s.sent.texts(), vec!["Not implemented yet!"]);
    }

    #[tokio::test]
    async fn broadcaster_sharing_the_bot_account_can_use_commands() {
        let mut s = setup(HOME).await;

        s.dispatcher
            .handle_event(&chat_event(HOME, "m-1", "!channel_add gorgc"))
            .await;
        s.dispatcher
            .handle_event(&chat_event(HOME, "m-2", "!game er"))
            .await;

        assert_eq!(
            s.sent.texts(),
            vec!["Added the channel gorgc.", "Changed game to \"Elden Ring\""]
        );
        assert_eq!(s.db.list_joined_channels().unwrap().len(), 1);
        assert_eq!(s.channel.modifications().len(), 1);
    }

    #[tokio::test]
    async fn stream_offline_prunes_history() {
        let mut s = setup("9000").await;
        s.db
            .upsert_title("Ancient", t0() - chrono::Duration::days(90))
            .unwrap();
        s.dispatcher
            .handle_event(&event(
                EVENT_STREAM_OFFLINE,
                json!({ "broadcaster_user_id": HOME }),
            ))
            .await;
        assert!(s.db.get_titles(10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_ignored() {
        let mut s = setup("9000").await;
        s.dispatcher
            .handle_event(&event(EVENT_CHAT_MESSAGE, json!({ "nope": 1 })))
            .await;
        assert!(s.sent.texts().is_empty());
    }
}
