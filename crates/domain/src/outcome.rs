//! Action calls and per-target command results.

use serde::{Deserialize, Serialize};

use crate::entity::EntityState;
use crate::error::{BridgeError, NotFoundError, TransportErrorKind, ValidationError};
use crate::id::EntityId;
use crate::resolution::{AmbiguousResolution, ResolutionError};

/// One service call against the automation platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub domain: String,
    pub service: String,
    pub entity_id: EntityId,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl ActionCall {
    #[must_use]
    pub fn new(domain: impl Into<String>, service: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            entity_id,
            data: serde_json::Map::new(),
        }
    }

    /// Call the service in the entity's own domain (`light.turn_on` for a light).
    #[must_use]
    pub fn for_entity(service: impl Into<String>, entity_id: EntityId) -> Self {
        Self::new(entity_id.domain().to_string(), service, entity_id)
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// `domain.service` as shown in logs.
    #[must_use]
    pub fn qualified_service(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }
}

/// What the platform reported back after a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    /// State of the target after the call, when the platform reports it.
    pub new_state: Option<EntityState>,
}

impl ActionResponse {
    #[must_use]
    pub fn with_state(state: EntityState) -> Self {
        Self {
            new_state: Some(state),
        }
    }
}

/// Why a single target failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetFailure {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("ambiguous: matches {}", join_ids(&.0.candidates))]
    Ambiguous(AmbiguousResolution),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl TargetFailure {
    /// Whether the platform could not be reached for this target.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                kind: TransportErrorKind::Unreachable | TransportErrorKind::Timeout,
                ..
            }
        )
    }
}

impl From<ResolutionError> for TargetFailure {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::NotFound(inner) => Self::NotFound(inner),
            ResolutionError::Ambiguous(inner) => Self::Ambiguous(inner),
        }
    }
}

impl From<BridgeError> for TargetFailure {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotFound(inner) => Self::NotFound(inner),
            BridgeError::Validation(inner) => Self::Validation(inner),
            BridgeError::Transport(inner) => Self::Transport {
                kind: inner.kind,
                message: inner.to_string(),
            },
            other @ (BridgeError::Parse(_) | BridgeError::PermissionDenied(_)) => {
                Self::Other(other.to_string())
            }
        }
    }
}

fn join_ids(ids: &[EntityId]) -> String {
    ids.iter()
        .map(EntityId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of one target of a command, in the order targets were given.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// Token the user typed for this target.
    pub token: String,
    /// Resolved entity, absent when resolution failed.
    pub entity_id: Option<EntityId>,
    pub outcome: Result<ActionResponse, TargetFailure>,
    /// Non-fatal warning attached to a successful resolution.
    pub warning: Option<AmbiguousResolution>,
}

impl CommandResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&TargetFailure> {
        self.outcome.as_ref().err()
    }
}
