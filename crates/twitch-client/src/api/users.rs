use super::*;

impl TwitchApiClient {
    /// Get the currently authenticated user.
    pub async fn get_current_user(&self, token: &Token) -> Result<TwitchUser, TwitchError> {
        let url = format!("{HELIX_BASE}/users");
        let body = self.authenticated_get(&url, token).await?;
        let resp: HelixResponse<TwitchUser> = serde_json::from_str(&body)?;

        resp.data
            .into_iter()
            .next()
            .ok_or_else(|| TwitchError::ApiError {
                status: 404,
                message: "Authenticated user not found".into(),
            })
    }

    /// Get user profile by login name. `Ok(None)` when no such user exists.
    pub async fn get_user_by_login(
        &self,
        token: &Token,
        login: &str,
    ) -> Result<Option<TwitchUser>, TwitchError> {
        let login = login.trim().trim_start_matches('@').to_lowercase();
        if login.is_empty() || !login.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Ok(None);
        }
        let url = format!("{HELIX_BASE}/users?login={login}");
        let body = self.authenticated_get(&url, token).await?;
        let resp: HelixResponse<TwitchUser> = serde_json::from_str(&body)?;
        Ok(resp.data.into_iter().next())
    }
}
