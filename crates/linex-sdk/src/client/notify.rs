//! LINE Notify: token-bound notifications and the OAuth2 flow that issues
//! those tokens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::{check_status, parse_json, ClientConfig, MessagingApi, OAuthCodeExchange};
use crate::config::Secret;
use crate::error::ApiError;

/// Result of a notification send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub status: u16,
    pub message: String,
}

/// Connection status of a Notify access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyStatus {
    pub status: u16,
    pub message: String,
    /// `USER` or `GROUP`.
    pub target_type: String,
    /// User or group name, when the platform discloses it.
    #[serde(default)]
    pub target: Option<String>,
}

/// Sends notifications to the user or group bound to a Notify access token.
#[derive(Clone)]
pub struct NotifyClient {
    http_client: reqwest::Client,
    access_token: Secret,
    base_url: String,
}

impl NotifyClient {
    /// Create a client for one Notify access token.
    pub fn new(access_token: Secret, config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http_client: config.build_http_client()?,
            access_token,
            base_url: config.notify_base_url.clone(),
        })
    }

    /// Send a text notification.
    pub async fn notify(&self, message: &str) -> Result<NotifyResponse, ApiError> {
        self.send(&[("message", message)]).await
    }

    /// Send a text notification with a sticker attached.
    pub async fn notify_with_sticker(
        &self,
        message: &str,
        package_id: &str,
        sticker_id: &str,
    ) -> Result<NotifyResponse, ApiError> {
        self.send(&[
            ("message", message),
            ("stickerPackageId", package_id),
            ("stickerId", sticker_id),
        ])
        .await
    }

    /// Check whether the access token is still valid.
    pub async fn status(&self) -> Result<NotifyStatus, ApiError> {
        let url = format!("{}/api/status", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.access_token.expose())
            .send()
            .await?;

        parse_json(check_status(response).await?).await
    }

    async fn send(&self, form: &[(&str, &str)]) -> Result<NotifyResponse, ApiError> {
        let url = format!("{}/api/notify", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.access_token.expose())
            .form(form)
            .send()
            .await?;

        parse_json(check_status(response).await?).await
    }
}

impl std::fmt::Debug for NotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyClient")
            .field("access_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// OAuth2 authorization-code provider for Notify tokens.
pub struct NotifyAuthorizer {
    api: Arc<dyn MessagingApi>,
    client_id: String,
    client_secret: Secret,
    redirect_uri: String,
    oauth_base_url: String,
}

impl NotifyAuthorizer {
    /// Create an authorizer.
    pub fn new(
        api: Arc<dyn MessagingApi>,
        client_id: impl Into<String>,
        client_secret: Secret,
        redirect_uri: impl Into<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            api,
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            oauth_base_url: config.oauth_base_url.clone(),
        }
    }

    /// Build the URL users visit to grant a Notify token.
    ///
    /// `state` is echoed back to the redirect URI for CSRF protection. With
    /// `form_post`, the code is POSTed to the redirect URI instead of passed
    /// as a query parameter.
    pub fn authorize_url(&self, state: &str, form_post: bool) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}/oauth/authorize", self.oauth_base_url)).map_err(
            |e| ApiError::Configuration {
                message: format!("Invalid OAuth base URL: {}", e),
            },
        )?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("scope", "notify")
                .append_pair("state", state);
            if form_post {
                query.append_pair("response_mode", "form_post");
            }
        }

        Ok(url)
    }

    /// Exchange the code delivered to the redirect URI for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<Secret, ApiError> {
        let exchange = OAuthCodeExchange {
            code: code.to_string(),
            redirect_uri: self.redirect_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        };

        let token = self.api.exchange_oauth_token(&exchange).await?;
        info!(client_id = %self.client_id, "Notify access token issued");
        Ok(token)
    }
}

impl std::fmt::Debug for NotifyAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyAuthorizer")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
