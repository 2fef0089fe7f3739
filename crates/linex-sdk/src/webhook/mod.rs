//! LINE webhook processing.
//!
//! - [`verify`] / [`SignatureVerifier`]: HMAC-SHA256 signature checks with
//!   constant-time comparison.
//! - [`WebhookReceiver`]: transport-agnostic intake that authenticates a
//!   request, decodes its events, and hands them to the dispatcher.
//! - [`WebhookRequest`] / [`WebhookResponse`]: the receiver's input and output.
//!
//! Authentication always runs against the raw body bytes, before any parsing.

mod receiver;
mod validation;

pub use receiver::{WebhookReceiver, WebhookRequest, WebhookResponse, SIGNATURE_HEADER};
pub use validation::{sign, verify, SignatureVerifier};
