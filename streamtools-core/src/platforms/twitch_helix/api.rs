// streamtools-core/src/platforms/twitch_helix/api.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::{debug, error};
use twitch_oauth2::AccessToken as TwitchAccessToken;

use crate::config::ConfigStore;
use crate::models::{AccessToken, TwitchUser};
use crate::traits::IdentityApi;
use crate::Error;

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Matches Twitch's JSON from the token endpoint (and the refresh proxy,
/// which forwards it).
#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
}

impl TwitchTokenResponse {
    fn into_token(self, previous: &AccessToken) -> AccessToken {
        AccessToken {
            bearer: self.access_token,
            refresh: self.refresh_token.unwrap_or_else(|| previous.refresh.clone()),
            expires_utc: Some(Utc::now() + chrono::Duration::seconds(self.expires_in as i64)),
        }
    }
}

/// Identity lookups and token refresh against Twitch.
///
/// Refresh goes straight to Twitch when a client secret is configured;
/// otherwise it is delegated to the configured refresh proxy.
pub struct HelixIdentityApi {
    http: ReqwestClient,
    config: Arc<ConfigStore>,
}

impl HelixIdentityApi {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            http: ReqwestClient::new(),
            config,
        }
    }

    async fn refresh_direct(
        &self,
        token: &AccessToken,
        client_id: String,
        client_secret: String,
    ) -> Result<AccessToken, Error> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", token.refresh.clone()),
            ("grant_type", "refresh_token".to_string()),
        ];

        let resp = self
            .http
            .post(TWITCH_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("HTTP error refreshing token: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Auth(format!("Twitch token endpoint error: {e}")))?
            .json::<TwitchTokenResponse>()
            .await
            .map_err(|e| Error::Auth(format!("Parse error on refresh JSON: {e}")))?;

        Ok(resp.into_token(token))
    }

    async fn refresh_via_proxy(&self, token: &AccessToken, url: &str) -> Result<AccessToken, Error> {
        let url = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid refresh proxy url '{url}': {e}")))?;
        let params = [("refreshToken", token.refresh.clone())];

        let resp = self
            .http
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("HTTP error refreshing token via proxy: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Auth(format!("refresh proxy error: {e}")))?
            .json::<TwitchTokenResponse>()
            .await
            .map_err(|e| Error::Auth(format!("Parse error on proxy refresh JSON: {e}")))?;

        Ok(resp.into_token(token))
    }
}

#[async_trait]
impl IdentityApi for HelixIdentityApi {
    async fn get_user(&self, token: &AccessToken) -> Result<Option<TwitchUser>, Error> {
        if token.is_empty() {
            return Ok(None);
        }
        let access_token = TwitchAccessToken::new(token.bearer.clone());
        let validated = access_token.validate_token(&self.http).await.map_err(|e| {
            error!("Twitch validate_token error => {e}");
            Error::Auth(format!("token validation failed: {e}"))
        })?;

        let login = validated.login.map(|l| l.to_string()).unwrap_or_default();
        let id = validated.user_id.map(|u| u.to_string()).unwrap_or_default();
        debug!("(HelixIdentityApi) token belongs to '{login}'");
        if login.is_empty() {
            return Ok(None);
        }
        Ok(Some(TwitchUser { id, login }))
    }

    async fn refresh_token(&self, token: &AccessToken) -> Result<AccessToken, Error> {
        if !token.can_refresh() {
            return Err(Error::Auth("No refresh token available.".into()));
        }
        let app = self.config.read(|c| c.twitch_app_config.clone());
        match (app.client_secret.filter(|s| !s.trim().is_empty()), app.refresh_proxy_url) {
            (Some(secret), _) => self.refresh_direct(token, app.client_id, secret).await,
            (None, Some(url)) if !url.trim().is_empty() => self.refresh_via_proxy(token, &url).await,
            _ => Err(Error::Config(
                "no client secret or refresh proxy configured; cannot refresh".into(),
            )),
        }
    }
}
