use super::*;

impl TwitchApiClient {
    /// Send a chat message to a broadcaster's chat as `sender_id`.
    ///
    /// Twitch may accept the request but still drop the message (AutoMod,
    /// slow mode, ...); that case is reported as `TwitchError::ChatDropped`.
    pub async fn send_chat_message(
        &self,
        token: &Token,
        broadcaster_id: &str,
        sender_id: &str,
        message: &str,
    ) -> Result<SentChatMessage, TwitchError> {
        let url = format!("{HELIX_BASE}/chat/messages");
        let request = SendChatMessageRequest {
            broadcaster_id,
            sender_id,
            message,
        };
        let body = self.authenticated_post(&url, token, &request).await?;
        parse_sent_message(&body)
    }
}

pub(super) fn parse_sent_message(body: &str) -> Result<SentChatMessage, TwitchError> {
    let resp: HelixResponse<SentChatMessage> = serde_json::from_str(body)?;
    let sent = resp
        .data
        .into_iter()
        .next()
        .ok_or_else(|| TwitchError::ChatDropped("empty response".into()))?;

    if !sent.is_sent {
        let reason = sent
            .drop_reason
            .as_ref()
            .map(|r| format!("{}: {}", r.code, r.message))
            .unwrap_or_else(|| "unknown reason".into());
        return Err(TwitchError::ChatDropped(reason));
    }
    Ok(sent)
}
