//! Webhook body decoding.
//!
//! Turns a raw webhook body into [`EventRecord`]s. Only the fields needed for
//! routing and replying are lifted out of each event; everything else stays in
//! `raw_payload`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ChannelMode, EventKind, EventRecord, ReplyToken, Source, SourceKind};
use crate::error::DecodeError;

/// Decode a webhook body into event records, preserving order.
///
/// Accepts the platform envelope `{"destination": ..., "events": [...]}` or a
/// bare array of event objects. Unknown event types, and unknown `message` or
/// `things` sub-types, decode to [`EventKind::Unknown`]. Well-known fields the
/// SDK cannot interpret (an unfamiliar source, mode, or timestamp) are left
/// unset and stay available in `raw_payload`.
///
/// # Errors
///
/// Returns `DecodeError` when the body is not JSON, holds no event list, or an
/// event is not an object or lacks its `type` discriminator.
pub fn decode(raw_body: &[u8]) -> Result<Vec<EventRecord>, DecodeError> {
    let body: Value = serde_json::from_slice(raw_body)?;

    let events = match body {
        Value::Array(events) => events,
        Value::Object(mut envelope) => match envelope.remove("events") {
            Some(Value::Array(events)) => events,
            _ => return Err(DecodeError::NotAnEventList),
        },
        _ => return Err(DecodeError::NotAnEventList),
    };

    events
        .into_iter()
        .enumerate()
        .map(|(index, event)| decode_event(index, event))
        .collect()
}

fn decode_event(index: usize, event: Value) -> Result<EventRecord, DecodeError> {
    let object = event
        .as_object()
        .ok_or(DecodeError::NotAnObject { index })?;

    let event_type = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingDiscriminator { index })?;

    let kind = classify(event_type, object);
    let source = decode_source(index, object);
    let timestamp = decode_timestamp(index, object);
    let mode = decode_mode(object);

    let reply_token = if kind.is_replyable() {
        object
            .get("replyToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(ReplyToken::new)
    } else {
        None
    };

    let webhook_event_id = object
        .get("webhookEventId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let is_redelivery = object
        .get("deliveryContext")
        .and_then(|context| context.get("isRedelivery"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(EventRecord {
        kind,
        source,
        reply_token,
        webhook_event_id,
        timestamp,
        mode,
        is_redelivery,
        raw_payload: event,
    })
}

/// A message or things event without a readable sub-type decodes to
/// `Unknown` with the bare event type.
fn classify(event_type: &str, object: &Map<String, Value>) -> EventKind {
    match event_type {
        "message" => match sub_type(object, "message") {
            Some(message_type) => EventKind::from_message_type(message_type)
                .unwrap_or_else(|| EventKind::Unknown(format!("message.{}", message_type))),
            None => EventKind::Unknown(event_type.to_string()),
        },
        "things" => match sub_type(object, "things") {
            Some(things_type) => EventKind::from_things_type(things_type)
                .unwrap_or_else(|| EventKind::Unknown(format!("things.{}", things_type))),
            None => EventKind::Unknown(event_type.to_string()),
        },
        other => EventKind::from_event_type(other)
            .unwrap_or_else(|| EventKind::Unknown(other.to_string())),
    }
}

fn sub_type<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    object
        .get(field)
        .and_then(|nested| nested.get("type"))
        .and_then(Value::as_str)
}

/// Sources the SDK cannot interpret are left in `raw_payload` only.
fn decode_source(index: usize, object: &Map<String, Value>) -> Option<Source> {
    let source = object.get("source").filter(|source| !source.is_null())?;

    let kind = match source.get("type").and_then(Value::as_str) {
        Some("user") => SourceKind::User,
        Some("group") => SourceKind::Group,
        Some("room") => SourceKind::Room,
        other => {
            debug!(index, source_type = ?other, "Event source not recognised");
            return None;
        }
    };

    let field = |name: &str| source.get(name).and_then(Value::as_str).map(str::to_string);
    let user_id = field("userId");
    let id = match kind {
        SourceKind::User => user_id.clone(),
        SourceKind::Group => field("groupId"),
        SourceKind::Room => field("roomId"),
    };
    let Some(id) = id else {
        debug!(index, source_kind = ?kind, "Event source has no chat identifier");
        return None;
    };

    Some(Source { kind, id, user_id })
}

fn decode_timestamp(index: usize, object: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let value = object.get("timestamp").filter(|value| !value.is_null())?;
    let timestamp = value.as_i64().and_then(DateTime::from_timestamp_millis);
    if timestamp.is_none() {
        debug!(index, timestamp = %value, "Event timestamp not in epoch milliseconds");
    }
    timestamp
}

fn decode_mode(object: &Map<String, Value>) -> ChannelMode {
    match object.get("mode").and_then(Value::as_str) {
        None | Some("active") => ChannelMode::Active,
        Some("standby") => ChannelMode::Standby,
        Some(_) => ChannelMode::Unknown,
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
