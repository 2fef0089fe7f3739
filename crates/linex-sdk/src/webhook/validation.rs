//! Webhook signature validation.
//!
//! LINE signs every webhook body with HMAC-SHA256 keyed by the channel secret
//! and sends the base64-encoded digest in the `x-line-signature` header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Secret;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature.
///
/// Computes the base64-encoded HMAC-SHA256 of `raw_body` keyed by
/// `channel_secret` and compares it with `signature_header` in constant time.
/// Returns `false` on any mismatch; never panics or errors.
///
/// # Examples
///
/// ```rust
/// use linex_sdk::webhook::{sign, verify};
///
/// let body = br#"{"events":[]}"#;
/// let signature = sign(body, "channel-secret");
///
/// assert!(verify(body, &signature, "channel-secret"));
/// assert!(!verify(body, &signature, "other-secret"));
/// ```
pub fn verify(raw_body: &[u8], signature_header: &str, channel_secret: &str) -> bool {
    let expected = sign(raw_body, channel_secret);
    let expected = expected.as_bytes();
    let provided = signature_header.as_bytes();

    // Length is not secret.
    if expected.len() != provided.len() {
        return false;
    }

    expected.ct_eq(provided).into()
}

/// Compute the `x-line-signature` value for a body.
///
/// Useful for tests and for forwarding signed payloads.
pub fn sign(raw_body: &[u8], channel_secret: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(raw_body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Validates webhook signatures against a fixed channel secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    channel_secret: Secret,
}

impl SignatureVerifier {
    /// Create a verifier for the given channel secret.
    pub fn new(channel_secret: Secret) -> Self {
        Self { channel_secret }
    }

    /// Check `signature` against `payload`.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        if self.channel_secret.is_empty() {
            return false;
        }
        verify(payload, signature, self.channel_secret.expose())
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("channel_secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
