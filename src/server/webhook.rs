//! Webhook endpoint handler.
//!
//! Verifies the delivery, normalizes it into an [`crate::types::Event`] and
//! queues it for the event worker before returning 202 Accepted. Resolution
//! and any actions happen asynchronously.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{AppState, ClientFactory};
use crate::engine::WorkerError;
use crate::types::DeliveryId;
use crate::webhooks::{ParseError, SignatureError, parse_webhook};

const HEADER_EVENT: &str = "x-github-event";
const HEADER_DELIVERY: &str = "x-github-delivery";
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),

    #[error("event worker unavailable: {0}")]
    Unavailable(#[from] WorkerError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Accepts one GitHub delivery.
///
/// - 202 Accepted: queued, or ignored because nothing handles it
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: bad signature
/// - 503 Service Unavailable: the event worker has stopped
pub async fn webhook_handler<F: ClientFactory>(
    State(app_state): State<AppState<F>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery = DeliveryId::new(get_header(&headers, HEADER_DELIVERY)?);
    let signature = get_header(&headers, HEADER_SIGNATURE)?;

    debug!(delivery = %delivery, event_type = %event_type, "received webhook");

    // Nothing in the body is looked at before the signature checks out.
    if let Err(e) = app_state.webhook_secret().verify(&body, &signature) {
        warn!(delivery = %delivery, error = %e, "rejecting webhook");
        return Err(e.into());
    }

    let event = match parse_webhook(&event_type, &body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(delivery = %delivery, event_type = %event_type, "ignoring webhook");
            return Ok((StatusCode::ACCEPTED, "Accepted (ignored)"));
        }
        Err(e) => {
            warn!(delivery = %delivery, event_type = %event_type, error = %e, "malformed webhook");
            return Err(e.into());
        }
    };

    let github = app_state.clients().for_repo(&event.repo);
    info!(
        delivery = %delivery,
        repo = %event.repo,
        issue = %event.target,
        kind = ?event.kind(),
        "webhook queued"
    );
    app_state.worker().submit(event, github, delivery).await?;

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn get_header_reads_present_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, HeaderValue::from_static("issues"));
        assert_eq!(get_header(&headers, HEADER_EVENT).unwrap(), "issues");
    }

    #[test]
    fn get_header_reports_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            get_header(&headers, HEADER_DELIVERY),
            Err(WebhookError::MissingHeader(HEADER_DELIVERY))
        ));
    }

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (
                WebhookError::MissingHeader(HEADER_SIGNATURE),
                StatusCode::BAD_REQUEST,
            ),
            (
                WebhookError::InvalidSignature(SignatureError::Mismatch),
                StatusCode::UNAUTHORIZED,
            ),
            (
                WebhookError::Unavailable(WorkerError::ChannelClosed),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
