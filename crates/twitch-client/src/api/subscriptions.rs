use super::*;

impl TwitchApiClient {
    /// Create an EventSub subscription bound to a WebSocket session.
    pub async fn create_eventsub_subscription(
        &self,
        token: &Token,
        request: &EventSubSubscriptionRequest,
    ) -> Result<(), TwitchError> {
        let url = format!("{HELIX_BASE}/eventsub/subscriptions");
        let _ = self.authenticated_post(&url, token, request).await?;
        Ok(())
    }
}
