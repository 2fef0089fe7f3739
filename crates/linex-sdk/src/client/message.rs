//! Outbound message objects and API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message that can be sent as a reply or push.
///
/// Serializes to the Messaging API's message object shape, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Plain text.
    Text { text: String },

    /// A sticker from a sticker package.
    #[serde(rename_all = "camelCase")]
    Sticker {
        package_id: String,
        sticker_id: String,
    },

    /// An image hosted at a public HTTPS URL.
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: String,
        preview_image_url: String,
    },

    /// A location pin.
    Location {
        title: String,
        address: String,
        latitude: f64,
        longitude: f64,
    },
}

impl Message {
    /// Create a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a sticker message.
    pub fn sticker(package_id: impl Into<String>, sticker_id: impl Into<String>) -> Self {
        Self::Sticker {
            package_id: package_id.into(),
            sticker_id: sticker_id.into(),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text { text }
    }
}

/// Body of `POST /v2/bot/message/reply`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReplyRequest<'a> {
    pub reply_token: &'a str,
    pub messages: &'a [Message],
    pub notification_disabled: bool,
}

/// Body of `POST /v2/bot/message/push`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PushRequest<'a> {
    pub to: &'a str,
    pub messages: &'a [Message],
    pub notification_disabled: bool,
}

/// Body of the webhook endpoint set and test calls.
#[derive(Debug, Serialize)]
pub(crate) struct EndpointRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<&'a str>,
}

/// The configured webhook URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEndpoint {
    pub endpoint: String,
    /// Whether webhook delivery is switched on in the console.
    pub active: bool,
}

/// Outcome of a webhook endpoint test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTestResult {
    pub success: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Status code the endpoint answered with; 0 if it could not be reached.
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub detail: String,
}

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
    /// Language tag of the user's LINE client, when the user has consented to share it.
    #[serde(default)]
    pub language: Option<String>,
}

/// Basic information about the bot account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotInfo {
    pub user_id: String,
    pub basic_id: String,
    pub display_name: String,
    #[serde(default)]
    pub premium_id: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub chat_mode: Option<String>,
    #[serde(default)]
    pub mark_as_read_mode: Option<String>,
}
