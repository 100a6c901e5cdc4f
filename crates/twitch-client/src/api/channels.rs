use super::*;

impl TwitchApiClient {
    /// Get the public channel information (game, title) of a broadcaster.
    pub async fn get_channel_info(
        &self,
        token: &Token,
        broadcaster_id: &str,
    ) -> Result<ChannelInfo, TwitchError> {
        let url = format!("{HELIX_BASE}/channels?broadcaster_id={broadcaster_id}");
        let body = self.authenticated_get(&url, token).await?;
        let resp: HelixResponse<ChannelInfo> = serde_json::from_str(&body)?;

        resp.data
            .into_iter()
            .next()
            .ok_or_else(|| TwitchError::ApiError {
                status: 404,
                message: "Channel not found".into(),
            })
    }

    /// Update game and/or title of a broadcaster's channel.
    ///
    /// Twitch answers 204 No Content on success.
    pub async fn modify_channel(
        &self,
        token: &Token,
        broadcaster_id: &str,
        request: &ModifyChannelRequest,
    ) -> Result<(), TwitchError> {
        if request.game_id.is_none() && request.title.is_none() {
            return Ok(());
        }
        let url = format!("{HELIX_BASE}/channels?broadcaster_id={broadcaster_id}");
        let _ = self.authenticated_patch(&url, token, request).await?;
        Ok(())
    }
}
