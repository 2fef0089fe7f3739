//! # linex SDK
//!
//! Building blocks for LINE Messaging API bots:
//!
//! - [`webhook`]: signature verification and webhook intake
//! - [`events`]: event decoding and per-event handler contexts
//! - [`dispatch`]: handler registration, commands, postbacks, `wait_for`,
//!   `emit` and the entity cache
//! - [`client`]: the outbound Messaging API and LINE Notify
//! - [`locale`]: localized strings with per-user locale resolution
//! - [`config`]: configuration and secrets
//!
//! [`LineBot`] wires these together for the common case; the HTTP transport
//! lives in the `linex-server` crate.
//!
//! # Examples
//!
//! ```rust
//! use linex_sdk::webhook::{sign, verify};
//!
//! let body = br#"{"destination":"U0","events":[]}"#;
//! let signature = sign(body, "channel-secret");
//!
//! assert!(verify(body, &signature, "channel-secret"));
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod locale;
pub mod webhook;

mod bot;

pub use bot::LineBot;

pub use error::{
    ApiError, BotError, BoxError, ConfigError, ContextError, DecodeError, DispatchError,
    HandlerError, LoadError, LocaleError, WebhookError,
};

pub use client::{LineClient, Message, MessagingApi};
pub use config::{BotConfig, Secret};
pub use dispatch::{Dispatcher, DispatchConfig, DispatchMode};
pub use events::{Context, EventKind, EventRecord, UserIdentity};
pub use locale::{LocaleArgs, LocaleConfig, LocaleHandle, LocaleResolver, LocaleStore};
pub use webhook::{WebhookReceiver, WebhookRequest, WebhookResponse};
