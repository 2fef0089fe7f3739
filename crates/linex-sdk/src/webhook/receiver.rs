//! Webhook intake: authenticate, decode, and hand events to the dispatcher.
//!
//! The receiver is transport-agnostic. An HTTP layer converts its request into
//! a [`WebhookRequest`] and the returned [`WebhookResponse`] back into a
//! status code and body.
//!
//! # Processing Steps
//!
//! 1. Verify the `x-line-signature` header against the raw body.
//! 2. Refuse the request while the dispatcher is not ready.
//! 3. Decode the body into event records.
//! 4. Drop standby-mode events when configured to.
//! 5. Dispatch, either in a spawned task (respond immediately) or inline
//!    (respond once every handler has finished).
//!
//! # Examples
//!
//! ```rust,no_run
//! use linex_sdk::client::MessagingApi;
//! use linex_sdk::config::Secret;
//! use linex_sdk::dispatch::{Dispatcher, DispatchConfig};
//! use linex_sdk::webhook::{WebhookReceiver, WebhookRequest};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example(api: Arc<dyn MessagingApi>) {
//! let dispatcher = Arc::new(Dispatcher::new(DispatchConfig::default()));
//! let receiver = WebhookReceiver::new(Secret::new("channel-secret"), dispatcher, api);
//!
//! let headers = HashMap::from([("x-line-signature".to_string(), "c2lnbmF0dXJl".to_string())]);
//! let request = WebhookRequest::new(headers, bytes::Bytes::from_static(br#"{"events":[]}"#));
//!
//! let response = receiver.receive_webhook(request).await;
//! println!("Status: {}", response.status_code());
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::validation::SignatureVerifier;
use crate::client::MessagingApi;
use crate::config::Secret;
use crate::dispatch::{DispatchMode, Dispatcher, DispatchReport};
use crate::error::{DispatchError, WebhookError};
use crate::events::{decode, ChannelMode};

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

// ============================================================================
// Webhook Request/Response Types
// ============================================================================

/// Raw webhook request data.
///
/// # Examples
///
/// ```rust
/// use linex_sdk::webhook::WebhookRequest;
/// use std::collections::HashMap;
///
/// let headers = HashMap::from([("X-Line-Signature".to_string(), "abc=".to_string())]);
/// let request = WebhookRequest::new(headers, br#"{"events":[]}"#.to_vec().into());
///
/// assert_eq!(request.signature(), Some("abc="));
/// ```
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    headers: HashMap<String, String>,
    body: Bytes,
}

impl WebhookRequest {
    /// Create a new webhook request.
    pub fn new(headers: HashMap<String, String>, body: Bytes) -> Self {
        Self { headers, body }
    }

    /// A header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// The `x-line-signature` header.
    pub fn signature(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER)
    }

    /// The raw body bytes, exactly as received.
    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// All headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Outcome of one webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResponse {
    /// 200 OK: the batch was accepted.
    Ok { message: String, events: usize },

    /// 401 Unauthorized: missing or invalid signature.
    Unauthorized { message: String },

    /// 400 Bad Request: the body is not a valid event batch.
    BadRequest { message: String },

    /// 503 Service Unavailable: the dispatcher is not ready yet.
    ServiceUnavailable { message: String },

    /// 500 Internal Server Error.
    InternalError { message: String },
}

impl WebhookResponse {
    /// The HTTP status code for this response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Ok { .. } => 200,
            Self::Unauthorized { .. } => 401,
            Self::BadRequest { .. } => 400,
            Self::ServiceUnavailable { .. } => 503,
            Self::InternalError { .. } => 500,
        }
    }

    /// The response message.
    pub fn message(&self) -> &str {
        match self {
            Self::Ok { message, .. }
            | Self::Unauthorized { message }
            | Self::BadRequest { message }
            | Self::ServiceUnavailable { message }
            | Self::InternalError { message } => message,
        }
    }

    /// Number of events accepted for dispatch; zero for failures.
    pub fn events(&self) -> usize {
        match self {
            Self::Ok { events, .. } => *events,
            _ => 0,
        }
    }

    /// Whether the request was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    fn unauthorized(error: WebhookError) -> Self {
        Self::Unauthorized {
            message: error.to_string(),
        }
    }

    fn not_ready() -> Self {
        Self::ServiceUnavailable {
            message: DispatchError::NotReady.to_string(),
        }
    }
}

// ============================================================================
// Webhook Receiver
// ============================================================================

/// Authenticates webhook requests and feeds their events to a [`Dispatcher`].
pub struct WebhookReceiver {
    verifier: SignatureVerifier,
    dispatcher: Arc<Dispatcher>,
    api: Arc<dyn MessagingApi>,
}

impl WebhookReceiver {
    /// Create a receiver verifying against `channel_secret`.
    pub fn new(
        channel_secret: Secret,
        dispatcher: Arc<Dispatcher>,
        api: Arc<dyn MessagingApi>,
    ) -> Self {
        Self {
            verifier: SignatureVerifier::new(channel_secret),
            dispatcher,
            api,
        }
    }

    /// The dispatcher events are handed to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Process one webhook request.
    ///
    /// Never panics; every failure maps to a non-success response.
    pub async fn receive_webhook(&self, request: WebhookRequest) -> WebhookResponse {
        let Some(signature) = request.signature() else {
            warn!("Webhook request without signature");
            return WebhookResponse::unauthorized(WebhookError::MissingSignature);
        };

        if !self.verifier.verify(request.payload(), signature) {
            warn!(
                body_length = request.payload().len(),
                "Invalid webhook signature"
            );
            return WebhookResponse::unauthorized(WebhookError::InvalidSignature);
        }

        if !self.dispatcher.is_ready() {
            warn!("Webhook received before the dispatcher is ready");
            return WebhookResponse::not_ready();
        }

        let mut events = match decode(request.payload()) {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Webhook payload could not be decoded");
                return WebhookResponse::BadRequest {
                    message: format!("Invalid webhook payload: {}", e),
                };
            }
        };

        if events.is_empty() {
            info!("Webhook verification request received");
            return WebhookResponse::Ok {
                message: "Webhook verified".to_string(),
                events: 0,
            };
        }

        let config = self.dispatcher.config();
        if config.ignore_standby {
            let received = events.len();
            events.retain(|event| event.mode != ChannelMode::Standby);
            let skipped = received - events.len();
            if skipped > 0 {
                debug!(skipped, "Skipped standby-mode events");
            }
        }

        let count = events.len();
        for event in &events {
            info!(
                event_id = %event.log_id(),
                event_name = %event.name(),
                redelivery = event.is_redelivery,
                "Webhook event accepted"
            );
        }

        match config.mode {
            DispatchMode::Background => {
                let dispatcher = self.dispatcher.clone();
                let api = self.api.clone();
                tokio::spawn(async move {
                    log_outcome(dispatcher.dispatch(events, api).await);
                });

                WebhookResponse::Ok {
                    message: "Webhook received".to_string(),
                    events: count,
                }
            }
            DispatchMode::Inline => match self.dispatcher.dispatch(events, self.api.clone()).await {
                Ok(report) => {
                    let message = if report.is_clean() {
                        "Webhook processed".to_string()
                    } else {
                        format!("Webhook processed with {} handler failures", report.failures.len())
                    };
                    log_outcome(Ok(report));
                    WebhookResponse::Ok {
                        message,
                        events: count,
                    }
                }
                Err(DispatchError::NotReady) => WebhookResponse::not_ready(),
                Err(e) => {
                    error!(error = %e, "Dispatch failed");
                    WebhookResponse::InternalError {
                        message: e.to_string(),
                    }
                }
            },
        }
    }
}

impl std::fmt::Debug for WebhookReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReceiver")
            .field("verifier", &self.verifier)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

fn log_outcome(outcome: Result<DispatchReport, DispatchError>) {
    match outcome {
        Ok(report) if report.is_clean() => {
            debug!(
                events = report.events,
                invocations = report.invocations,
                "Webhook batch dispatched"
            );
        }
        Ok(report) => {
            warn!(
                events = report.events,
                invocations = report.invocations,
                failures = report.failures.len(),
                "Webhook batch dispatched with handler failures"
            );
        }
        Err(e) => error!(error = %e, "Webhook batch was not dispatched"),
    }
}

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;
