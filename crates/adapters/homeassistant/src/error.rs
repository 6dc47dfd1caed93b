//! Home Assistant adapter error types.

use hassbridge_domain::error::{BridgeError, Collaborator, TransportError, TransportErrorKind};

/// Errors specific to the Home Assistant adapter.
#[derive(Debug, thiserror::Error)]
pub enum HomeAssistantError {
    /// The access token cannot be sent as a header value.
    #[error("invalid access token")]
    InvalidToken(#[source] reqwest::header::InvalidHeaderValue),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The request did not produce a response.
    #[error("request to Home Assistant failed")]
    Request(#[source] reqwest::Error),

    /// Home Assistant answered with a non-success status.
    #[error("Home Assistant answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not what the API documents.
    #[error("failed to decode Home Assistant response")]
    Decode(#[source] serde_json::Error),
}

impl HomeAssistantError {
    fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Request(err) if err.is_timeout() => TransportErrorKind::Timeout,
            Self::Request(err) if err.is_decode() => TransportErrorKind::InvalidResponse,
            Self::InvalidToken(_) | Self::Client(_) | Self::Request(_) => {
                TransportErrorKind::Unreachable
            }
            Self::Status { status, .. } => TransportErrorKind::Rejected { status: *status },
            Self::Decode(_) => TransportErrorKind::InvalidResponse,
        }
    }

    /// Convert into a [`BridgeError`] attributed to `collaborator`.
    #[must_use]
    pub fn into_bridge(self, collaborator: Collaborator) -> BridgeError {
        let kind = self.kind();
        TransportError::with_source(collaborator, kind, self).into()
    }
}

impl From<HomeAssistantError> for BridgeError {
    fn from(err: HomeAssistantError) -> Self {
        err.into_bridge(Collaborator::AutomationPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_status_error() {
        let err = HomeAssistantError::Status {
            status: 401,
            body: "401: Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Home Assistant answered 401: 401: Unauthorized");
    }

    #[test]
    fn should_convert_status_to_rejected_transport_error() {
        let err: BridgeError = HomeAssistantError::Status {
            status: 500,
            body: String::new(),
        }
        .into();
        let BridgeError::Transport(inner) = err else {
            panic!("expected transport error");
        };
        assert_eq!(inner.collaborator, Collaborator::AutomationPlatform);
        assert_eq!(inner.kind, TransportErrorKind::Rejected { status: 500 });
    }

    #[test]
    fn should_attribute_error_to_given_collaborator() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = HomeAssistantError::Decode(json_err).into_bridge(Collaborator::ConversationAgent);
        let BridgeError::Transport(inner) = err else {
            panic!("expected transport error");
        };
        assert_eq!(inner.collaborator, Collaborator::ConversationAgent);
        assert_eq!(inner.kind, TransportErrorKind::InvalidResponse);
    }
}
