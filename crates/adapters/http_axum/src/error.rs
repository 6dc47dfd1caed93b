//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hassbridge_domain::error::BridgeError;

/// JSON error body returned by the webhook endpoints.
#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: String,
}

/// Why a webhook request was not delivered.
#[derive(Debug)]
pub enum WebhookError {
    /// Token missing or not matching the configured one.
    Unauthorized,
    /// A required field is missing or empty.
    MissingField(&'static str),
    /// The reply sink failed to deliver.
    Delivery(BridgeError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid webhook token".to_string()),
            Self::MissingField(field) => (StatusCode::BAD_REQUEST, format!("{field} is required")),
            Self::Delivery(err) => {
                tracing::error!(error = %err, "webhook delivery failed");
                (StatusCode::BAD_GATEWAY, "failed to deliver message".to_string())
            }
        };

        (
            status,
            Json(ErrorBody {
                status: "error",
                error: message,
            }),
        )
            .into_response()
    }
}
