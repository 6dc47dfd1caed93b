//! OneBot adapter error types.

use hassbridge_domain::error::{BridgeError, Collaborator, TransportError, TransportErrorKind};

/// Errors specific to the OneBot adapter.
#[derive(Debug, thiserror::Error)]
pub enum OneBotError {
    /// The websocket URL or access token does not form a valid request.
    #[error("invalid websocket request")]
    InvalidRequest(#[source] tokio_tungstenite::tungstenite::Error),

    /// The websocket failed while connecting, reading or writing.
    #[error("websocket error")]
    WebSocket(#[source] tokio_tungstenite::tungstenite::Error),

    /// No connection is currently up, or it dropped before the action was answered.
    #[error("not connected to the OneBot implementation")]
    Disconnected,

    /// An action was not answered in time.
    #[error("action {action} timed out")]
    Timeout { action: String },

    /// The implementation answered an action with a failure status.
    #[error("action {action} failed with retcode {retcode}")]
    ActionFailed { action: String, retcode: i64 },

    /// A frame could not be encoded or decoded.
    #[error("malformed OneBot frame")]
    Json(#[source] serde_json::Error),

    /// `get_record` returned neither inline data nor a location.
    #[error("voice record has no data")]
    MissingRecord,

    /// Inline voice data was not valid base64.
    #[error("voice record is not valid base64")]
    InvalidBase64(#[source] base64::DecodeError),

    /// Downloading a voice record failed.
    #[error("failed to download voice record")]
    Download(#[source] reqwest::Error),
}

impl OneBotError {
    fn kind(&self) -> TransportErrorKind {
        match self {
            Self::InvalidRequest(_) | Self::WebSocket(_) | Self::Disconnected | Self::Download(_) => {
                TransportErrorKind::Unreachable
            }
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::ActionFailed { retcode, .. } => TransportErrorKind::Rejected {
                status: u16::try_from(*retcode).unwrap_or(u16::MAX),
            },
            Self::Json(_) | Self::MissingRecord | Self::InvalidBase64(_) => {
                TransportErrorKind::InvalidResponse
            }
        }
    }
}

impl From<OneBotError> for BridgeError {
    fn from(err: OneBotError) -> Self {
        let kind = err.kind();
        TransportError::with_source(Collaborator::ChatTransport, kind, err).into()
    }
}
