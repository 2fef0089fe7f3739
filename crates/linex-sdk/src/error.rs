//! Error types for linex SDK operations.
//!
//! Each subsystem owns one error enum. Transport-boundary errors
//! ([`WebhookError`], [`DecodeError`]) terminate a single webhook request,
//! [`HandlerError`] terminates a single handler invocation, and
//! [`LocaleError`] terminates a single locale lookup. None of them are fatal to
//! the process on their own.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by application-provided handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Authentication failures on the inbound webhook.
///
/// A request that fails authentication is rejected before its body is
/// decoded.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The `x-line-signature` header was not present.
    #[error("Missing x-line-signature header")]
    MissingSignature,

    /// The signature did not match the request body.
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

/// Errors while decoding a webhook body into event records.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body is not valid JSON.
    #[error("Webhook body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body is neither an event array nor an object with an `events` array.
    #[error("Webhook body does not contain an event list")]
    NotAnEventList,

    /// An entry of the event list is not a JSON object.
    #[error("Event at index {index} is not an object")]
    NotAnObject { index: usize },

    /// An event has no `type` discriminator.
    #[error("Event at index {index} has no 'type' field")]
    MissingDiscriminator { index: usize },
}

/// A failed handler invocation.
///
/// Handler failures are caught at the dispatch boundary, logged, and recorded
/// in the dispatch report. They never abort sibling handlers or other events.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("Handler {handler_index} for '{event_name}' failed: {message}")]
    Failed {
        event_name: String,
        handler_index: usize,
        message: String,
    },

    /// The handler panicked.
    #[error("Handler {handler_index} for '{event_name}' panicked")]
    Panicked {
        event_name: String,
        handler_index: usize,
    },

    /// The event's handlers did not finish within the configured timeout.
    #[error("Handlers for '{event_name}' timed out after {after:?}")]
    TimedOut { event_name: String, after: Duration },
}

impl HandlerError {
    /// Name of the event whose handler failed.
    pub fn event_name(&self) -> &str {
        match self {
            Self::Failed { event_name, .. } => event_name,
            Self::Panicked { event_name, .. } => event_name,
            Self::TimedOut { event_name, .. } => event_name,
        }
    }
}

/// Errors from the dispatcher itself.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Dispatch was requested before the ready hooks ran.
    #[error("Dispatcher is not ready yet")]
    NotReady,

    /// A command with the same name has already been registered.
    #[error("Command already exists: '{name}'")]
    DuplicateCommand { name: String },

    /// `wait_for` did not observe a matching event in time.
    #[error("Timed out waiting for '{event_name}' event")]
    WaitTimedOut { event_name: String },
}

/// Errors from acting on an event context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The event carries no reply token.
    #[error("Event '{event_name}' cannot be replied to")]
    NotReplyable { event_name: String },

    /// The reply token is older than the platform's reply window.
    #[error("Reply window expired: the event is older than {minutes} minutes")]
    ReplyWindowExpired { minutes: i64 },

    /// The event has no source to push messages to.
    #[error("Event has no source to push messages to")]
    NoSource,

    /// The outbound call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Errors during messaging API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API returned an error status.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// The request was rate limited.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The access token was rejected.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The requested resource was not found.
    #[error("Resource not found")]
    NotFound,

    /// The response body could not be interpreted.
    #[error("Unexpected response: {message}")]
    InvalidResponse { message: String },

    /// The request was rejected before it was sent.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Client misconfiguration (bad base URL, TLS setup, ...).
    #[error("Client configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client error (network, TLS, timeout).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// The SDK never retries on its own; this is advisory for callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500,
            Self::RateLimited => true,
            Self::AuthenticationFailed => false,
            Self::NotFound => false,
            Self::InvalidResponse { .. } => false,
            Self::InvalidRequest { .. } => false,
            Self::Configuration { .. } => false,
            Self::HttpClientError(e) => e.is_timeout() || e.is_connect(),
        }
    }
}

/// Failures while loading a locale directory.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The locale directory does not exist.
    #[error("Locale directory does not exist: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// The manifest is required for the configured grouping but absent.
    #[error("Locale manifest not found in {path} (expected _meta.json with a 'locales' list)")]
    ManifestMissing { path: PathBuf },

    /// The manifest is present but unusable.
    #[error("Invalid locale manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    /// A file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file is not valid structured data of the expected shape.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A key uses locale tags that the manifest does not declare.
    #[error("{path}: key '{key}' uses undeclared locales {tags:?}")]
    UnknownLocales {
        path: PathBuf,
        key: String,
        tags: Vec<String>,
    },

    /// A key lacks manifest locales and no usable fallback exists.
    #[error("{path}: key '{key}' is missing locales {tags:?}")]
    MissingLocales {
        path: PathBuf,
        key: String,
        tags: Vec<String>,
    },

    /// A configured default or fallback locale is not in the manifest.
    #[error("Configured {role} locale '{tag}' is not declared in the manifest")]
    UndeclaredConfiguredLocale { role: &'static str, tag: String },

    /// A template could not be parsed.
    #[error("{path}: template '{key}' for locale '{locale}' is malformed: {source}")]
    MalformedTemplate {
        path: PathBuf,
        key: String,
        locale: String,
        #[source]
        source: TemplateError,
    },
}

/// Errors while parsing a template string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{` was opened but never closed.
    #[error("unterminated placeholder starting at byte {position}")]
    Unterminated { position: usize },
}

/// Errors from locale loading and resolution.
#[derive(Debug, Error)]
pub enum LocaleError {
    /// The locale directory could not be loaded.
    #[error("Locale load failed: {0}")]
    Load(#[from] LoadError),

    /// The category or key does not exist.
    #[error("Unknown locale key: '{path}'")]
    Key { path: String },

    /// No template exists for the active locale (nor the fallback).
    #[error("No translation for '{path}' in locale '{locale}'")]
    MissingTranslation { path: String, locale: String },

    /// Placeholders had no matching argument.
    #[error("Missing arguments for '{path}': {missing:?}")]
    Argument { path: String, missing: Vec<String> },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("Required setting missing: {name}")]
    Missing { name: String },

    /// A setting has an unusable value.
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: String, message: String },
}

/// Errors while assembling a [`LineBot`](crate::LineBot).
#[derive(Debug, Error)]
pub enum BotError {
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The API client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The locale directory failed to load.
    #[error(transparent)]
    Locale(#[from] LocaleError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
