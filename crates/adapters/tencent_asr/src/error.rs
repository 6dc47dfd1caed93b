//! Tencent ASR adapter error types.

use hassbridge_domain::error::{BridgeError, Collaborator, TransportError, TransportErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum AsrError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("invalid signing key")]
    InvalidKey(#[source] hmac::digest::InvalidLength),

    #[error("request failed")]
    Request(#[source] reqwest::Error),

    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    #[error("recognition failed: {code} {message}")]
    Vendor { code: String, message: String },

    #[error("malformed response")]
    Decode(#[source] serde_json::Error),
}

impl AsrError {
    fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Request(err) if err.is_timeout() => TransportErrorKind::Timeout,
            Self::Request(_) | Self::InvalidEndpoint(_) | Self::InvalidKey(_) => {
                TransportErrorKind::Unreachable
            }
            Self::Status { status, .. } => TransportErrorKind::Rejected { status: *status },
            // Vendor errors come back with HTTP 200.
            Self::Vendor { .. } => TransportErrorKind::Rejected { status: 200 },
            Self::Decode(_) => TransportErrorKind::InvalidResponse,
        }
    }
}

impl From<AsrError> for BridgeError {
    fn from(err: AsrError) -> Self {
        let kind = err.kind();
        TransportError::with_source(Collaborator::Transcription, kind, err).into()
    }
}
