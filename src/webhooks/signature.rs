//! `X-Hub-Signature-256` verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw body and sends the
//! digest as `sha256=<hex>`. Deliveries must be verified before the body is
//! parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is not of the form sha256=<hex>")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,

    #[error("webhook secret is not a valid HMAC key")]
    InvalidKey,
}

/// The shared secret configured on the GitHub webhook.
#[derive(Clone)]
pub struct WebhookSecret(Vec<u8>);

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

impl WebhookSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        WebhookSecret(secret.into())
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.0).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(payload);
        Ok(mac)
    }

    /// Produces the header value GitHub would send for `payload`.
    pub fn sign(&self, payload: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(payload)?.finalize().into_bytes();
        Ok(format!("{PREFIX}{}", hex::encode(digest)))
    }

    /// Checks `header` against `payload` in constant time.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        let expected = decode_header(header)?;
        self.mac(payload)?
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

/// Decodes `sha256=<hex>` into raw digest bytes.
pub fn decode_header(header: &str) -> Result<Vec<u8>, SignatureError> {
    let digest = header
        .trim()
        .strip_prefix(PREFIX)
        .ok_or(SignatureError::Malformed)?;
    if digest.is_empty() {
        return Err(SignatureError::Malformed);
    }
    hex::decode(digest).map_err(|_| SignatureError::Malformed)
}
