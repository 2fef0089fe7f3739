//! LINE webhook event types.
//!
//! A webhook body carries a batch of events. Each one is decoded into an
//! [`EventRecord`] whose [`EventKind`] drives routing, and then wrapped in a
//! [`Context`] that carries the capabilities valid for that kind.
//!
//! # Examples
//!
//! ```rust
//! use linex_sdk::events::{decode, EventKind};
//!
//! let body = br#"{"events":[{"type":"follow","replyToken":"r1",
//!     "source":{"type":"user","userId":"U1"},"mode":"active"}]}"#;
//!
//! let events = decode(body).unwrap();
//! assert_eq!(events[0].kind, EventKind::Follow);
//! assert_eq!(events[0].reply_token.as_ref().map(|t| t.as_str()), Some("r1"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod context;
pub mod decoder;

pub use context::{Context, EventContext, PostbackContext, ReplyableContext, TextMessageContext};
pub use decoder::decode;

// ============================================================================
// Event Kind
// ============================================================================

/// Classification of a webhook event.
///
/// Message events are split by message type. Events the SDK does not know
/// about decode to [`EventKind::Unknown`] carrying the raw type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Text,
    Image,
    Video,
    Audio,
    File,
    Location,
    Sticker,
    Unsend,
    Follow,
    Unfollow,
    Join,
    Leave,
    MemberJoin,
    MemberLeave,
    Postback,
    VideoComplete,
    Beacon,
    AccountLink,
    DeviceLink,
    DeviceUnlink,
    ScenarioResult,
    Unknown(String),
}

impl EventKind {
    /// Handler registration name for this kind (e.g. `"text"`, `"member_join"`).
    pub fn name(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Location => "location",
            Self::Sticker => "sticker",
            Self::Unsend => "unsend",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::MemberJoin => "member_join",
            Self::MemberLeave => "member_leave",
            Self::Postback => "postback",
            Self::VideoComplete => "video_complete",
            Self::Beacon => "beacon",
            Self::AccountLink => "account_link",
            Self::DeviceLink => "device_link",
            Self::DeviceUnlink => "device_unlink",
            Self::ScenarioResult => "scenario_result",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether events of this kind carry a reply token.
    pub fn is_replyable(&self) -> bool {
        !matches!(
            self,
            Self::Unsend | Self::Unfollow | Self::Leave | Self::MemberLeave | Self::Unknown(_)
        )
    }

    /// Whether this kind is a message event.
    pub fn is_message(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Image
                | Self::Video
                | Self::Audio
                | Self::File
                | Self::Location
                | Self::Sticker
        )
    }

    /// Map a message `type` to its kind.
    pub(crate) fn from_message_type(message_type: &str) -> Option<Self> {
        let kind = match message_type {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "file" => Self::File,
            "location" => Self::Location,
            "sticker" => Self::Sticker,
            _ => return None,
        };
        Some(kind)
    }

    /// Map a top-level event `type` (other than `message` and `things`) to its kind.
    pub(crate) fn from_event_type(event_type: &str) -> Option<Self> {
        let kind = match event_type {
            "unsend" => Self::Unsend,
            "follow" => Self::Follow,
            "unfollow" => Self::Unfollow,
            "join" => Self::Join,
            "leave" => Self::Leave,
            "memberJoined" => Self::MemberJoin,
            "memberLeft" => Self::MemberLeave,
            "postback" => Self::Postback,
            "videoPlayComplete" => Self::VideoComplete,
            "beacon" => Self::Beacon,
            "accountLink" => Self::AccountLink,
            _ => return None,
        };
        Some(kind)
    }

    /// Map a `things.type` to its kind.
    pub(crate) fn from_things_type(things_type: &str) -> Option<Self> {
        let kind = match things_type {
            "link" => Self::DeviceLink,
            "unlink" => Self::DeviceUnlink,
            "scenarioResult" => Self::ScenarioResult,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Source
// ============================================================================

/// Kind of chat an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    User,
    Group,
    Room,
}

/// Originating user, group, or room of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Chat kind.
    pub kind: SourceKind,

    /// Chat identifier: the user id for one-on-one chats, else the group or room id.
    pub id: String,

    /// Acting user, when the platform discloses it.
    pub user_id: Option<String>,
}

impl Source {
    /// Identity used for per-user lookups such as locale preference.
    ///
    /// Falls back to the chat id when the acting user is unknown.
    pub fn user_identity(&self) -> UserIdentity {
        UserIdentity::new(self.user_id.as_deref().unwrap_or(&self.id))
    }
}

/// Opaque per-user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Wrap a user key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Event Record
// ============================================================================

/// Reply token attached to replyable events.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyToken(String);

impl ReplyToken {
    /// Wrap a reply token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyToken(<REDACTED>)")
    }
}

/// Channel state at delivery time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// The channel may reply and push.
    #[default]
    Active,

    /// Another module owns the conversation; replies are not possible.
    Standby,

    /// A mode this SDK does not know about.
    #[serde(other)]
    Unknown,
}

/// One decoded webhook event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Routing classification.
    pub kind: EventKind,

    /// Originating chat.
    pub source: Option<Source>,

    /// Reply token; only ever set for replyable kinds.
    pub reply_token: Option<ReplyToken>,

    /// Platform-assigned event id.
    pub webhook_event_id: Option<String>,

    /// Time the event occurred.
    pub timestamp: Option<DateTime<Utc>>,

    /// Channel state at delivery time.
    pub mode: ChannelMode,

    /// Whether this is a redelivery of an earlier event.
    pub is_redelivery: bool,

    /// The untouched event object.
    pub raw_payload: serde_json::Value,
}

impl EventRecord {
    /// Create a record with only a kind and raw payload.
    pub fn new(kind: EventKind, raw_payload: serde_json::Value) -> Self {
        Self {
            kind,
            source: None,
            reply_token: None,
            webhook_event_id: None,
            timestamp: None,
            mode: ChannelMode::Active,
            is_redelivery: false,
            raw_payload,
        }
    }

    /// Handler registration name of this event.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Identity of the acting user, when a source is present.
    pub fn user_identity(&self) -> Option<UserIdentity> {
        self.source.as_ref().map(Source::user_identity)
    }

    /// Identifier for log correlation.
    pub fn log_id(&self) -> &str {
        self.webhook_event_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
