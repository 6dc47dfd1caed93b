//! Error taxonomy shared across the workspace.
//!
//! Each failure class has its own typed error and converts into
//! [`BridgeError`] via `#[from]`. Adapters wrap their own failures into a
//! [`TransportError`] before crossing a port boundary.

use std::fmt;

/// Top-level error type crossing port and service boundaries.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("parse error")]
    Parse(#[from] ParseError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("permission denied")]
    PermissionDenied(#[from] PermissionDenied),

    #[error("transport error")]
    Transport(#[from] TransportError),
}

impl BridgeError {
    /// Whether this error means an external collaborator could not be reached.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_unreachable())
    }
}

/// Failure to tokenize raw command text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("command must start with {marker:?}")]
    MissingMarker { marker: String },

    #[error("command verb is missing")]
    MissingVerb,

    #[error("unterminated quote starting at byte {position}")]
    UnterminatedQuote { position: usize },
}

/// Domain-level validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("entity id must look like \"domain.object_id\", got {0:?}")]
    MalformedEntityId(String),

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("friendly name must not be empty")]
    EmptyFriendlyName,

    #[error("at least one target is required")]
    MissingTarget,

    #[error("this command accepts a single target, got {0}")]
    TooManyTargets(usize),

    #[error("a mode or a temperature is required")]
    MissingClimateSetting,

    #[error("invalid temperature {0:?}")]
    InvalidTemperature(String),

    #[error("unrecognised climate argument {0:?}")]
    UnknownClimateArgument(String),

    #[error("{verb} does not accept {argument:?}")]
    UnexpectedArgument { verb: String, argument: String },

    #[error("{entity_id} is not a {expected} entity")]
    WrongDomain { entity_id: String, expected: String },

    #[error("a search query is required")]
    MissingQuery,
}

/// A user token that matched no entity in the directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no entity matches {token:?}")]
pub struct NotFoundError {
    pub token: String,
}

/// A sender attempted a gated verb without being on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sender {sender_id} may not run {verb}")]
pub struct PermissionDenied {
    pub sender_id: String,
    pub verb: String,
}

/// External collaborator that produced a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    AutomationPlatform,
    ConversationAgent,
    Transcription,
    ChatTransport,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutomationPlatform => f.write_str("automation platform"),
            Self::ConversationAgent => f.write_str("conversation agent"),
            Self::Transcription => f.write_str("transcription service"),
            Self::ChatTransport => f.write_str("chat transport"),
        }
    }
}

/// How a collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, closed socket.
    Unreachable,
    /// The call did not complete within the configured timeout.
    Timeout,
    /// The collaborator answered with a non-success status.
    Rejected { status: u16 },
    /// The collaborator answered with a payload we could not interpret.
    InvalidResponse,
}

/// Failure talking to an external collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{collaborator} call failed ({kind})")]
pub struct TransportError {
    pub collaborator: Collaborator,
    pub kind: TransportErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => f.write_str("unreachable"),
            Self::Timeout => f.write_str("timed out"),
            Self::Rejected { status } => write!(f, "rejected with status {status}"),
            Self::InvalidResponse => f.write_str("invalid response"),
        }
    }
}

impl TransportError {
    /// Build an error without an underlying cause.
    #[must_use]
    pub fn new(collaborator: Collaborator, kind: TransportErrorKind) -> Self {
        Self {
            collaborator,
            kind,
            source: None,
        }
    }

    /// Build an error wrapping the adapter-specific cause.
    pub fn with_source(
        collaborator: Collaborator,
        kind: TransportErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            collaborator,
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a call that exceeded its deadline.
    #[must_use]
    pub fn timeout(collaborator: Collaborator) -> Self {
        Self::new(collaborator, TransportErrorKind::Timeout)
    }

    /// Unreachable and timed-out collaborators are treated alike by callers.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Unreachable | TransportErrorKind::Timeout
        )
    }
}
