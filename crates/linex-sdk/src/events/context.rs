//! Per-event contexts.
//!
//! A context couples one [`EventRecord`] with the shared outbound API. The
//! [`Context`] variant is chosen from the event kind, so only contexts that
//! hold a reply token expose `reply`.

use std::ops::Deref;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;

use super::{ChannelMode, EventKind, EventRecord, ReplyToken, Source, UserIdentity};
use crate::client::{Message, MessagingApi};
use crate::error::ContextError;

/// How long after the event a reply token stays usable.
pub const REPLY_WINDOW_MINUTES: i64 = 20;

// ============================================================================
// Event Context
// ============================================================================

/// Capabilities common to every event.
#[derive(Clone)]
pub struct EventContext {
    event: EventRecord,
    api: Arc<dyn MessagingApi>,
}

impl EventContext {
    /// Wrap an event.
    pub fn new(event: EventRecord, api: Arc<dyn MessagingApi>) -> Self {
        Self { event, api }
    }

    /// The underlying event record.
    pub fn event(&self) -> &EventRecord {
        &self.event
    }

    /// Event classification.
    pub fn kind(&self) -> &EventKind {
        &self.event.kind
    }

    /// Originating chat.
    pub fn source(&self) -> Option<&Source> {
        self.event.source.as_ref()
    }

    /// Identity of the acting user.
    pub fn user_identity(&self) -> Option<UserIdentity> {
        self.event.user_identity()
    }

    /// Whether the channel could act on this event when it was delivered.
    pub fn is_active(&self) -> bool {
        self.event.mode == ChannelMode::Active
    }

    /// Shared outbound API.
    pub fn api(&self) -> &Arc<dyn MessagingApi> {
        &self.api
    }

    /// Push messages to the chat the event came from.
    ///
    /// Unlike a reply this needs no token and has no time window.
    pub async fn push(&self, messages: &[Message]) -> Result<(), ContextError> {
        let source = self.source().ok_or(ContextError::NoSource)?;
        self.api.push_message(&source.id, messages).await?;
        Ok(())
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Replyable Context
// ============================================================================

/// Context of an event that carries a reply token.
#[derive(Debug, Clone)]
pub struct ReplyableContext {
    base: EventContext,
    reply_token: ReplyToken,
}

impl ReplyableContext {
    /// The bound reply token.
    pub fn reply_token(&self) -> &ReplyToken {
        &self.reply_token
    }

    /// Reply to the event.
    ///
    /// # Errors
    ///
    /// `ContextError::ReplyWindowExpired` once the event is older than
    /// [`REPLY_WINDOW_MINUTES`]; `ContextError::Api` if the call fails.
    pub async fn reply(&self, messages: &[Message]) -> Result<(), ContextError> {
        if let Some(timestamp) = self.base.event.timestamp {
            if Utc::now() - timestamp > Duration::minutes(REPLY_WINDOW_MINUTES) {
                return Err(ContextError::ReplyWindowExpired {
                    minutes: REPLY_WINDOW_MINUTES,
                });
            }
        }

        self.base.api.send_reply(&self.reply_token, messages).await?;
        Ok(())
    }

    /// Reply with a single text message.
    pub async fn reply_text(&self, text: impl Into<String>) -> Result<(), ContextError> {
        self.reply(&[Message::text(text)]).await
    }
}

impl Deref for ReplyableContext {
    type Target = EventContext;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

// ============================================================================
// Specialised Contexts
// ============================================================================

/// Context of a text message.
#[derive(Debug, Clone)]
pub struct TextMessageContext {
    inner: ReplyableContext,
}

impl TextMessageContext {
    /// Message text.
    pub fn text(&self) -> &str {
        message_text(&self.event().raw_payload).unwrap_or_default()
    }

    /// Platform message id.
    pub fn message_id(&self) -> Option<&str> {
        self.event().raw_payload["message"]["id"].as_str()
    }
}

impl Deref for TextMessageContext {
    type Target = ReplyableContext;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Context of a postback.
#[derive(Debug, Clone)]
pub struct PostbackContext {
    inner: ReplyableContext,
}

impl PostbackContext {
    /// Postback data string.
    pub fn data(&self) -> &str {
        self.event().raw_payload["postback"]["data"]
            .as_str()
            .unwrap_or_default()
    }

    /// Date/time picker parameters, when present.
    pub fn params(&self) -> Option<&Value> {
        self.event().raw_payload["postback"].get("params")
    }

    /// Arguments following `prefix` in the data string.
    ///
    /// Data built with [`postback_data`](crate::dispatch::postback_data) has
    /// the form `prefix;a;b`. Returns `None` when the data is not for
    /// `prefix`.
    pub fn args_after(&self, prefix: &str) -> Option<Vec<&str>> {
        split_postback(self.data(), prefix)
    }
}

impl Deref for PostbackContext {
    type Target = ReplyableContext;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub(crate) fn split_postback<'a>(data: &'a str, prefix: &str) -> Option<Vec<&'a str>> {
    let rest = data.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    let rest = rest.strip_prefix(';')?;
    Some(rest.split(';').collect())
}

fn message_text(payload: &Value) -> Option<&str> {
    payload["message"]["text"].as_str()
}

// ============================================================================
// Context
// ============================================================================

/// The context handed to handlers.
#[derive(Debug, Clone)]
pub enum Context {
    /// A text message with a reply token.
    Text(TextMessageContext),

    /// A postback with a reply token.
    Postback(PostbackContext),

    /// Any other event with a reply token.
    Replyable(ReplyableContext),

    /// An event that cannot be replied to: a non-replyable kind, or a
    /// replyable kind delivered without a token (standby mode).
    Passive(EventContext),
}

impl Context {
    /// Build the context variant for an event.
    pub fn new(event: EventRecord, api: Arc<dyn MessagingApi>) -> Self {
        let reply_token = event
            .reply_token
            .clone()
            .filter(|_| event.kind.is_replyable());
        let kind = event.kind.clone();
        let base = EventContext::new(event, api);

        let Some(reply_token) = reply_token else {
            return Self::Passive(base);
        };
        let inner = ReplyableContext { base, reply_token };

        match kind {
            EventKind::Text => Self::Text(TextMessageContext { inner }),
            EventKind::Postback => Self::Postback(PostbackContext { inner }),
            _ => Self::Replyable(inner),
        }
    }

    /// The common capabilities.
    pub fn base(&self) -> &EventContext {
        match self {
            Self::Text(ctx) => &ctx.inner.base,
            Self::Postback(ctx) => &ctx.inner.base,
            Self::Replyable(ctx) => &ctx.base,
            Self::Passive(ctx) => ctx,
        }
    }

    /// The reply capability, if the event has one.
    pub fn as_replyable(&self) -> Option<&ReplyableContext> {
        match self {
            Self::Text(ctx) => Some(&ctx.inner),
            Self::Postback(ctx) => Some(&ctx.inner),
            Self::Replyable(ctx) => Some(ctx),
            Self::Passive(_) => None,
        }
    }

    /// The underlying event record.
    pub fn event(&self) -> &EventRecord {
        self.base().event()
    }

    /// Event classification.
    pub fn kind(&self) -> &EventKind {
        self.base().kind()
    }

    /// Message text for text events, with or without a reply token.
    pub fn text(&self) -> Option<&str> {
        match self.kind() {
            EventKind::Text => message_text(&self.event().raw_payload),
            _ => None,
        }
    }

    /// Postback data for postback events, with or without a reply token.
    pub fn postback_data(&self) -> Option<&str> {
        match self.kind() {
            EventKind::Postback => self.event().raw_payload["postback"]["data"].as_str(),
            _ => None,
        }
    }

    /// Reply to the event.
    ///
    /// # Errors
    ///
    /// `ContextError::NotReplyable` for passive contexts.
    pub async fn reply(&self, messages: &[Message]) -> Result<(), ContextError> {
        match self.as_replyable() {
            Some(ctx) => ctx.reply(messages).await,
            None => Err(ContextError::NotReplyable {
                event_name: self.kind().name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
