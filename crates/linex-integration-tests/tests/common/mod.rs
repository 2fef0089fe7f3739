//! Common test utilities for linex integration tests
//!
//! This module provides:
//! - A recording `MessagingApi` standing in for the LINE platform
//! - Builders for webhook payloads and signed HTTP requests
//! - Helpers for assembling a bot behind the HTTP router

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use linex_sdk::client::{Message, MessagingApi, OAuthCodeExchange, Profile};
use linex_sdk::config::{BotConfig, Secret};
use linex_sdk::events::ReplyToken;
use linex_sdk::webhook::{sign, SIGNATURE_HEADER};
use linex_sdk::{ApiError, LineBot};
use linex_server::{create_router, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SECRET: &str = "integration-channel-secret";

// ============================================================================
// Recording Messaging API
// ============================================================================

/// Records every outbound call and serves profiles from a fixed table.
#[derive(Default)]
pub struct RecordingApi {
    replies: Mutex<Vec<(String, Vec<Message>)>>,
    pushes: Mutex<Vec<(String, Vec<Message>)>>,
    languages: HashMap<String, String>,
}

impl RecordingApi {
    #[allow(dead_code)]
    pub fn with_language(mut self, user_id: &str, language: &str) -> Self {
        self.languages
            .insert(user_id.to_string(), language.to_string());
        self
    }

    /// Reply texts in the order they were sent, keyed by reply token.
    #[allow(dead_code)]
    pub async fn reply_texts(&self) -> Vec<(String, String)> {
        self.replies
            .lock()
            .await
            .iter()
            .flat_map(|(token, messages)| {
                messages.iter().filter_map(move |message| match message {
                    Message::Text { text } => Some((token.clone(), text.clone())),
                    _ => None,
                })
            })
            .collect()
    }

    #[allow(dead_code)]
    pub async fn push_count(&self) -> usize {
        self.pushes.lock().await.len()
    }
}

#[async_trait]
impl MessagingApi for RecordingApi {
    async fn send_reply(&self, token: &ReplyToken, messages: &[Message]) -> Result<(), ApiError> {
        self.replies
            .lock()
            .await
            .push((token.as_str().to_string(), messages.to_vec()));
        Ok(())
    }

    async fn push_message(&self, target: &str, messages: &[Message]) -> Result<(), ApiError> {
        self.pushes
            .lock()
            .await
            .push((target.to_string(), messages.to_vec()));
        Ok(())
    }

    async fn exchange_oauth_token(&self, _: &OAuthCodeExchange) -> Result<Secret, ApiError> {
        Err(ApiError::AuthenticationFailed)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ApiError> {
        Ok(Profile {
            user_id: user_id.to_string(),
            display_name: format!("user {user_id}"),
            picture_url: None,
            status_message: None,
            language: self.languages.get(user_id).cloned(),
        })
    }
}

// ============================================================================
// Payload Builders
// ============================================================================

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A text message event from `user_id`.
#[allow(dead_code)]
pub fn text_event(id: &str, user_id: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "mode": "active",
        "timestamp": now_millis(),
        "webhookEventId": id,
        "deliveryContext": { "isRedelivery": false },
        "replyToken": format!("reply-{id}"),
        "source": { "type": "user", "userId": user_id },
        "message": { "type": "text", "id": format!("m-{id}"), "text": text }
    })
}

/// A postback event from `user_id`.
#[allow(dead_code)]
pub fn postback_event(id: &str, user_id: &str, data: &str) -> Value {
    json!({
        "type": "postback",
        "mode": "active",
        "timestamp": now_millis(),
        "webhookEventId": id,
        "deliveryContext": { "isRedelivery": false },
        "replyToken": format!("reply-{id}"),
        "source": { "type": "user", "userId": user_id },
        "postback": { "data": data }
    })
}

/// Wrap events in a webhook body.
pub fn batch(events: Vec<Value>) -> String {
    json!({ "destination": "Ubot", "events": events }).to_string()
}

/// A webhook POST to `/` signed with [`SECRET`].
pub fn signed_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, sign(body.as_bytes(), SECRET))
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a JSON response body.
pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Application Assembly
// ============================================================================

/// A bot configuration using [`SECRET`].
pub fn bot_config() -> BotConfig {
    BotConfig::new(SECRET, "integration-access-token")
}

/// Assemble a bot around `api`.
pub async fn create_bot(config: BotConfig, api: Arc<RecordingApi>) -> Arc<LineBot> {
    Arc::new(LineBot::with_api(config, api).await.unwrap())
}

/// The router for `bot`, serving webhooks at `/`.
pub fn create_app(bot: Arc<LineBot>) -> axum::Router {
    create_router(AppState::new(bot), "/")
}
