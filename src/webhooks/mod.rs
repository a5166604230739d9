//! Inbound GitHub webhooks.
//!
//! - Signature verification (HMAC-SHA256)
//! - Normalization of payloads into [`crate::types::Event`]

mod parser;
mod signature;

pub use parser::{ParseError, parse_webhook};
pub use signature::{SignatureError, WebhookSecret, decode_header};
