//! Outbound LINE API surface.
//!
//! Handlers act on events through [`MessagingApi`]. [`LineClient`] is the
//! reqwest-backed implementation; tests substitute their own. Every call is
//! independent and is never retried by the SDK: [`ApiError::is_transient`]
//! tells callers whether retrying could help. Calls are paced against LINE's
//! published per-endpoint budgets, see [`RateLimits`].

mod message;
mod notify;
mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BotConfig, Secret};
use crate::error::ApiError;
use crate::events::ReplyToken;

pub use message::{BotInfo, Message, Profile, WebhookEndpoint, WebhookTestResult};
pub use notify::{NotifyAuthorizer, NotifyClient, NotifyResponse, NotifyStatus};
pub use rate_limit::{RateLimit, RateLimits};

use message::{EndpointRequest, PushRequest, ReplyRequest};

/// Parameters of an OAuth2 authorization-code exchange.
#[derive(Debug, Clone)]
pub struct OAuthCodeExchange {
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: Secret,
}

/// Operations handlers may perform against the platform.
///
/// Implementations must be safe to share across concurrently running
/// handlers.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Reply to an event using its reply token.
    async fn send_reply(&self, reply_token: &ReplyToken, messages: &[Message])
        -> Result<(), ApiError>;

    /// Push messages to a user, group, or room.
    async fn push_message(&self, target: &str, messages: &[Message]) -> Result<(), ApiError>;

    /// Exchange an OAuth2 authorization code for an access token.
    async fn exchange_oauth_token(&self, exchange: &OAuthCodeExchange)
        -> Result<Secret, ApiError>;

    /// Fetch a user's profile.
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ApiError>;
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the outbound HTTP client.
///
/// # Examples
///
/// ```
/// use linex_sdk::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_api_base_url("http://localhost:8080");
///
/// assert_eq!(config.timeout_seconds, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Messaging API base URL.
    pub api_base_url: String,

    /// OAuth (notify-bot) base URL.
    pub oauth_base_url: String,

    /// Notify API base URL.
    pub notify_base_url: String,

    /// Request timeout in seconds.
    pub timeout_seconds: u64,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.line.me".to_string(),
            oauth_base_url: "https://notify-bot.line.me".to_string(),
            notify_base_url: "https://notify-api.line.me".to_string(),
            timeout_seconds: 30,
            user_agent: format!("linex-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs();
        self
    }

    /// Set the Messaging API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the OAuth base URL.
    pub fn with_oauth_base_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_base_url = url.into();
        self
    }

    /// Set the Notify API base URL.
    pub fn with_notify_base_url(mut self, url: impl Into<String>) -> Self {
        self.notify_base_url = url.into();
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })
    }
}

// ============================================================================
// LINE Client
// ============================================================================

/// Messaging API client authenticated with a channel access token.
#[derive(Clone)]
pub struct LineClient {
    http_client: reqwest::Client,
    access_token: Secret,
    config: ClientConfig,
    limits: RateLimits,
}

impl LineClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the HTTP client cannot be created.
    pub fn new(access_token: Secret, config: ClientConfig) -> Result<Self, ApiError> {
        let http_client = config.build_http_client()?;
        Ok(Self {
            http_client,
            access_token,
            config,
            limits: RateLimits::default(),
        })
    }

    /// Replace the rate limit budgets.
    pub fn with_rate_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Create a client from a bot configuration.
    pub fn from_config(config: &BotConfig) -> Result<Self, ApiError> {
        Self::new(config.channel_access_token.clone(), config.api.clone())
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch information about the bot account.
    pub async fn get_bot_info(&self) -> Result<BotInfo, ApiError> {
        self.limits.other.acquire().await;
        let url = format!("{}/v2/bot/info", self.config.api_base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.access_token.expose())
            .send()
            .await?;

        parse_json(check_status(response).await?).await
    }

    // ------------------------------------------------------------------------
    // Webhook endpoint
    // ------------------------------------------------------------------------

    /// Set the URL LINE delivers webhooks to.
    ///
    /// # Errors
    ///
    /// `ApiError::InvalidRequest` unless `endpoint` is an absolute HTTPS URL.
    pub async fn set_webhook_endpoint(&self, endpoint: &str) -> Result<(), ApiError> {
        validate_endpoint(endpoint)?;
        self.limits.webhook_endpoint.acquire().await;
        debug!(endpoint = %endpoint, "Setting webhook endpoint");

        let response = self
            .http_client
            .put(self.webhook_url("endpoint"))
            .bearer_auth(self.access_token.expose())
            .json(&EndpointRequest {
                endpoint: Some(endpoint),
            })
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Fetch the configured webhook URL and whether delivery is enabled.
    pub async fn get_webhook_endpoint(&self) -> Result<WebhookEndpoint, ApiError> {
        self.limits.webhook_endpoint.acquire().await;

        let response = self
            .http_client
            .get(self.webhook_url("endpoint"))
            .bearer_auth(self.access_token.expose())
            .send()
            .await?;

        parse_json(check_status(response).await?).await
    }

    /// Ask LINE to send a test event to `endpoint`, or to the configured
    /// endpoint when `None`.
    ///
    /// # Errors
    ///
    /// `ApiError::InvalidRequest` if `endpoint` is not an absolute HTTPS URL.
    pub async fn test_webhook_endpoint(
        &self,
        endpoint: Option<&str>,
    ) -> Result<WebhookTestResult, ApiError> {
        if let Some(endpoint) = endpoint {
            validate_endpoint(endpoint)?;
        }
        self.limits.webhook_test.acquire().await;

        let response = self
            .http_client
            .post(self.webhook_url("test"))
            .bearer_auth(self.access_token.expose())
            .json(&EndpointRequest { endpoint })
            .send()
            .await?;

        let result: WebhookTestResult = parse_json(check_status(response).await?).await?;
        debug!(
            success = result.success,
            status_code = result.status_code,
            reason = %result.reason,
            "Webhook endpoint tested"
        );
        Ok(result)
    }

    fn webhook_url(&self, leaf: &str) -> String {
        format!("{}/v2/bot/channel/webhook/{}", self.config.api_base_url, leaf)
    }

    async fn post_messages<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), ApiError> {
        self.limits.other.acquire().await;
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.access_token.expose())
            .header("X-Line-Retry-Key", uuid::Uuid::new_v4().to_string())
            .json(body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("access_token", &"<REDACTED>")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl MessagingApi for LineClient {
    async fn send_reply(
        &self,
        reply_token: &ReplyToken,
        messages: &[Message],
    ) -> Result<(), ApiError> {
        debug!(count = messages.len(), "Sending reply");
        self.limits.other.acquire().await;

        let url = format!("{}/v2/bot/message/reply", self.config.api_base_url);
        let body = ReplyRequest {
            reply_token: reply_token.as_str(),
            messages,
            notification_disabled: false,
        };

        // Reply tokens are single-use, so replies carry no retry key.
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.access_token.expose())
            .json(&body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn push_message(&self, target: &str, messages: &[Message]) -> Result<(), ApiError> {
        debug!(target = %target, count = messages.len(), "Pushing messages");

        let body = PushRequest {
            to: target,
            messages,
            notification_disabled: false,
        };
        self.post_messages("/v2/bot/message/push", &body).await
    }

    async fn exchange_oauth_token(
        &self,
        exchange: &OAuthCodeExchange,
    ) -> Result<Secret, ApiError> {
        let url = format!("{}/oauth/token", self.config.oauth_base_url);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", exchange.code.as_str()),
            ("redirect_uri", exchange.redirect_uri.as_str()),
            ("client_id", exchange.client_id.as_str()),
            ("client_secret", exchange.client_secret.expose()),
        ];

        let response = self.http_client.post(&url).form(&form[..]).send().await?;

        let token: TokenResponse = parse_json(check_status(response).await?).await?;
        Ok(Secret::new(token.access_token))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ApiError> {
        self.limits.other.acquire().await;
        let url = format!("{}/v2/bot/profile/{}", self.config.api_base_url, user_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.access_token.expose())
            .send()
            .await?;

        parse_json(check_status(response).await?).await
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ApiError> {
    match url::Url::parse(endpoint) {
        Ok(url) if url.scheme() == "https" && url.has_host() => Ok(()),
        _ => Err(ApiError::InvalidRequest {
            message: format!("Webhook endpoint must be an absolute HTTPS URL: '{}'", endpoint),
        }),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Map error statuses onto `ApiError`.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 => Err(ApiError::AuthenticationFailed),
        404 => Err(ApiError::NotFound),
        429 => Err(ApiError::RateLimited),
        code => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(ApiError::HttpError {
                status: code,
                message,
            })
        }
    }
}

pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::InvalidResponse {
            message: e.to_string(),
        })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
