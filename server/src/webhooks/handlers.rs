//! Webhook Receiver
//!
//! `POST {WEBHOOK_PATH}`: authenticate the delivery, queue it, answer 200.
//! Formatting and IRC delivery happen later on the consumer and never affect
//! the response.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, instrument, warn};

use super::queue::EnqueueOutcome;
use super::signing;
use super::types::{Delivery, WebhookError, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use crate::api::{AppState, MAX_BODY_SIZE};

/// Upload deadline, inside the router's request timeout.
const BODY_READ_TIMEOUT: Duration = Duration::from_secs(5);

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// POST /webhook
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, WebhookError> {
    let kind = header_str(&headers, EVENT_HEADER).ok_or(WebhookError::MissingEventHeader)?;
    let delivery_id = header_str(&headers, DELIVERY_HEADER).map(str::to_owned);

    let Some(signature) = header_str(&headers, SIGNATURE_HEADER) else {
        warn!(event = %kind, "Rejected unsigned webhook delivery");
        return Err(WebhookError::MissingSignature);
    };

    // Read the body only after the headers pass, so header errors win.
    let read = tokio::time::timeout(BODY_READ_TIMEOUT, to_bytes(body, MAX_BODY_SIZE));
    let body = match read.await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(event = %kind, error = %e, "Failed to read webhook body");
            return Err(WebhookError::UnreadableBody);
        }
        Err(_) => {
            warn!(event = %kind, "Timed out reading webhook body");
            return Err(WebhookError::UnreadableBody);
        }
    };

    if let Err(e) = signing::verify_signature(state.secret.key(), &body, signature) {
        warn!(event = %kind, error = %e, "Rejected webhook delivery");
        return Err(e.into());
    }

    let outcome = state.queue.try_enqueue(Delivery {
        kind: kind.to_owned(),
        delivery_id: delivery_id.clone(),
        body,
    });
    if outcome == EnqueueOutcome::Queued {
        debug!(
            event = %kind,
            delivery = delivery_id.as_deref().unwrap_or("unknown"),
            "Queued webhook delivery"
        );
    }

    Ok(StatusCode::OK)
}
