//! Webhook Types
//!
//! Queued deliveries and the receiver's rejection taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use thiserror::Error;

use super::signing::SignatureError;

/// Header naming the GitHub event kind.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the `sha1=<hex>` body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Header carrying GitHub's unique delivery GUID.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// One authenticated webhook delivery waiting to be announced.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Raw `X-GitHub-Event` value (e.g. `push`, `issues`).
    pub kind: String,
    /// `X-GitHub-Delivery` GUID, when GitHub sent one.
    pub delivery_id: Option<String>,
    /// Unparsed request body.
    pub body: Bytes,
}

/// Reasons the receiver rejects a delivery.
///
/// Callers only ever see the status code and a short fixed message.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("missing event header")]
    MissingEventHeader,
    #[error("no signature")]
    MissingSignature,
    #[error("malformed signature")]
    MalformedSignature(SignatureError),
    #[error("bad signature")]
    InvalidSignature,
    #[error("unreadable body")]
    UnreadableBody,
}

impl From<SignatureError> for WebhookError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Mismatch => Self::InvalidSignature,
            other => Self::MalformedSignature(other),
        }
    }
}

impl WebhookError {
    /// HTTP status this rejection maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingEventHeader | Self::UnreadableBody => StatusCode::BAD_REQUEST,
            Self::MissingSignature | Self::MalformedSignature(_) | Self::InvalidSignature => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status(), format!("error: {self}")).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            WebhookError::MissingEventHeader.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(WebhookError::UnreadableBody.status(), StatusCode::BAD_REQUEST);
        assert_eq!(WebhookError::MissingSignature.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            WebhookError::from(SignatureError::InvalidHex).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            WebhookError::from(SignatureError::Mismatch).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn mismatch_is_not_reported_as_malformed() {
        assert!(matches!(
            WebhookError::from(SignatureError::Mismatch),
            WebhookError::InvalidSignature
        ));
        assert!(matches!(
            WebhookError::from(SignatureError::InvalidLength),
            WebhookError::MalformedSignature(SignatureError::InvalidLength)
        ));
    }
}
