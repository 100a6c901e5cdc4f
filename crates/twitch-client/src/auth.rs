//! OAuth token management for the bot account.
//!
//! Authorization URL generation, authorization-code exchange and token
//! refresh. Persisting tokens is left to the caller.

use chrono::Utc;
use serde::Deserialize;
use url::Url;

use crate::{SCOPES, Token, TwitchError};

const AUTHORIZE_URL: &str = "https://id.twitch.tv/oauth2/authorize";
const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Refresh tokens that expire within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 30 * 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    expires_in: i64,
    scope: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
}

/// Twitch OAuth client (authorization code grant).
pub struct TwitchAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl TwitchAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http: reqwest::Client::new(),
        }
    }

    /// Authorization URL the broadcaster opens once to grant the bot scopes.
    pub fn get_auth_url(&self) -> Result<String, TwitchError> {
        let mut url = Url::parse(AUTHORIZE_URL)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("force_verify", "true");
        Ok(url.to_string())
    }

    /// Exchange an authorization code for access and refresh tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<Token, TwitchError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code.trim()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let resp = self.http.post(TOKEN_URL).form(&params).send().await?;
        parse_token_response(resp).await
    }

    /// Refresh an access token with its refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token, TwitchError> {
        tracing::info!("Refreshing Twitch OAuth token");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let resp = self.http.post(TOKEN_URL).form(&params).send().await?;
        parse_token_response(resp).await
    }

    /// Refresh `current` if it expires within [`REFRESH_MARGIN_SECS`].
    ///
    /// `Ok(None)` means the token is still good; `Ok(Some(token))` carries the
    /// refreshed token, which the caller should persist.
    pub async fn get_or_refresh_token(
        &self,
        current: &Token,
    ) -> Result<Option<Token>, TwitchError> {
        let now = Utc::now().timestamp();
        if !needs_refresh(current, now) {
            return Ok(None);
        }
        if current.refresh_token.is_empty() {
            return Err(TwitchError::AuthRequired);
        }

        tracing::info!(
            expires_in_secs = current.expires_at - now,
            "Token expiring soon, refreshing"
        );
        let token = self.refresh_token(&current.refresh_token).await?;
        Ok(Some(token))
    }
}

/// Whether `token` is inside the refresh margin at unix time `now`.
pub fn needs_refresh(token: &Token, now: i64) -> bool {
    now >= token.expires_at - REFRESH_MARGIN_SECS
}

async fn parse_token_response(resp: reqwest::Response) -> Result<Token, TwitchError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let err: ErrorResponse = serde_json::from_str(&body).unwrap_or(ErrorResponse {
            error: Some(status.to_string()),
            message: Some(body.clone()),
        });
        return Err(TwitchError::TokenRefreshFailed(format!(
            "{}: {}",
            err.error.unwrap_or_default(),
            err.message.unwrap_or_default()
        )));
    }

    let token_resp: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| TwitchError::TokenRefreshFailed(format!("failed to parse response: {e}")))?;

    let scope = token_resp
        .scope
        .map(|s| s.join(" "))
        .unwrap_or_else(|| SCOPES.join(" "));

    Ok(Token {
        access_token: token_resp.access_token,
        refresh_token: token_resp.refresh_token,
        scope,
        expires_at: Utc::now().timestamp() + token_resp.expires_in,
    })
}
