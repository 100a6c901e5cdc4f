use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as Msg;

use super::*;
use crate::api::{EventSubSubscriptionRequest, EventSubTransport, TwitchApiClient};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Deserialize)]
pub(super) struct WsMessage {
    pub(super) metadata: WsMetadata,
    #[serde(default)]
    pub(super) payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct WsMetadata {
    pub(super) message_type: String,
}

#[derive(Debug, Deserialize)]
struct WelcomePayload {
    session: SessionInfo,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    id: String,
}

pub(super) enum MessageAction {
    Continue,
    Event(EventSubEvent),
    Reconnect(String),
}

impl EventSubClient {
    pub(super) async fn connect_once(
        config: &EventSubConfig,
        ws_url: &str,
        event_tx: &mpsc::Sender<EventSubEvent>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<Option<String>, TwitchError> {
        tracing::info!(ws_url = %ws_url, "Connecting to EventSub WebSocket");
        let (mut ws, _) = connect_async(ws_url).await?;
        let session_id = Self::wait_for_welcome(&mut ws).await?;
        // Subscriptions carry over to the new session after session_reconnect.
        if ws_url == EVENTSUB_URL {
            Self::subscribe_events(config, &session_id).await?;
        }

        let timeout = KEEPALIVE_TIMEOUT * 2;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("EventSub shutdown during listen");
                    let _ = ws.close(None).await;
                    return Ok(None);
                }
                result = tokio::time::timeout(timeout, ws.next()) => {
                    match result {
                        Ok(Some(Ok(Msg::Text(text)))) => match Self::handle_message(&text)? {
                            MessageAction::Continue => {}
                            MessageAction::Event(event) => {
                                tracing::debug!(event_type = %event.event_type, "EventSub notification");
                                if event_tx.send(event).await.is_err() {
                                    tracing::info!("EventSub receiver dropped, closing connection");
                                    let _ = ws.close(None).await;
                                    return Ok(None);
                                }
                            }
                            MessageAction::Reconnect(next_url) => {
                                tracing::info!(next_url = %next_url, "EventSub session_reconnect received");
                                let _ = ws.close(None).await;
                                return Ok(Some(next_url));
                            }
                        },
                        Ok(Some(Ok(Msg::Ping(data)))) => {
                            let _ = ws.send(Msg::Pong(data)).await;
                        }
                        Ok(Some(Ok(Msg::Close(_)))) | Ok(None) => {
                            tracing::warn!("EventSub WebSocket closed by server");
                            return Err(TwitchError::EventSub("Server closed".into()));
                        }
                        Ok(Some(Err(e))) => return Err(TwitchError::WebSocket(e)),
                        Ok(Some(Ok(_))) => {}
                        Err(_) => {
                            tracing::warn!("EventSub keepalive timeout");
                            return Err(TwitchError::Timeout);
                        }
                    }
                }
            }
        }
    }

    async fn wait_for_welcome(ws: &mut WsStream) -> Result<String, TwitchError> {
        loop {
            match tokio::time::timeout(KEEPALIVE_TIMEOUT, ws.next()).await {
                Ok(Some(Ok(Msg::Text(text)))) => {
                    let ws_msg: WsMessage = serde_json::from_str(&text)?;
                    if ws_msg.metadata.message_type == "session_welcome" {
                        let p: WelcomePayload = serde_json::from_value(ws_msg.payload)?;
                        tracing::info!(session_id = %p.session.id, "EventSub welcome");
                        return Ok(p.session.id);
                    }
                }
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => return Err(TwitchError::WebSocket(e)),
                Ok(None) => return Err(TwitchError::EventSub("Connection closed".into())),
                Err(_) => return Err(TwitchError::Timeout),
            }
        }
    }

    pub(super) fn handle_message(text: &str) -> Result<MessageAction, TwitchError> {
        let ws_msg: WsMessage = serde_json::from_str(text)?;
        match ws_msg.metadata.message_type.as_str() {
            "session_keepalive" => {
                tracing::trace!("EventSub keepalive received");
                Ok(MessageAction::Continue)
            }
            "notification" => Ok(Self::parse_notification(&ws_msg.payload)
                .map(MessageAction::Event)
                .unwrap_or(MessageAction::Continue)),
            "session_reconnect" => Self::parse_reconnect_url(&ws_msg.payload)
                .map(MessageAction::Reconnect)
                .ok_or_else(|| {
                    TwitchError::EventSub("session_reconnect missing reconnect_url".into())
                }),
            "revocation" => {
                let sub_type = Self::subscription_type(&ws_msg.payload).unwrap_or("unknown");
                tracing::warn!(sub_type, "EventSub subscription revoked");
                Ok(MessageAction::Continue)
            }
            other => {
                tracing::debug!(msg_type = other, "Unhandled EventSub message");
                Ok(MessageAction::Continue)
            }
        }
    }

    pub(super) fn parse_notification(payload: &serde_json::Value) -> Option<EventSubEvent> {
        let event_type = Self::subscription_type(payload)?;
        Some(EventSubEvent {
            event_type: event_type.to_string(),
            payload: payload
                .get("event")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        })
    }

    fn subscription_type(payload: &serde_json::Value) -> Option<&str> {
        payload
            .get("subscription")
            .and_then(|s| s.get("type"))
            .and_then(|t| t.as_str())
    }

    pub(super) fn parse_reconnect_url(payload: &serde_json::Value) -> Option<String> {
        payload
            .get("session")
            .and_then(|session| session.get("reconnect_url"))
            .and_then(|url| url.as_str())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned)
    }

    async fn subscribe_events(config: &EventSubConfig, session_id: &str) -> Result<(), TwitchError> {
        let api = TwitchApiClient::new(config.client_id.clone());
        for sub in &config.subscriptions {
            let request = EventSubSubscriptionRequest {
                event_type: sub.event_type.clone(),
                version: Self::event_version(&sub.event_type).into(),
                condition: Self::build_condition(sub, &config.bot_user_id),
                transport: EventSubTransport {
                    method: "websocket".into(),
                    session_id: session_id.into(),
                },
            };
            match api.create_eventsub_subscription(&config.token, &request).await {
                Ok(()) => tracing::info!(
                    event_type = %sub.event_type,
                    broadcaster_user_id = %sub.broadcaster_user_id,
                    "Subscribed to EventSub event"
                ),
                Err(e) => {
                    tracing::error!(
                        event_type = %sub.event_type,
                        broadcaster_user_id = %sub.broadcaster_user_id,
                        error = %e,
                        "Failed to subscribe"
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub(super) fn event_version(event_type: &str) -> &'static str {
        match event_type {
            EVENT_CHANNEL_UPDATE => "2",
            _ => "1",
        }
    }

    pub(super) fn build_condition(sub: &Subscription, bot_user_id: &str) -> serde_json::Value {
        match sub.event_type.as_str() {
            EVENT_CHAT_MESSAGE => serde_json::json!({
                "broadcaster_user_id": sub.broadcaster_user_id,
                "user_id": bot_user_id,
            }),
            _ => serde_json::json!({
                "broadcaster_user_id": sub.broadcaster_user_id,
            }),
        }
    }
}
