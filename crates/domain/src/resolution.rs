//! Resolution results — how a user token was mapped onto an entity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NotFoundError;
use crate::id::EntityId;

/// Which resolver tier produced a match. Ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    ExactId,
    FriendlyName,
    Alias,
    Fuzzy,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactId => f.write_str("entity id"),
            Self::FriendlyName => f.write_str("friendly name"),
            Self::Alias => f.write_str("alias"),
            Self::Fuzzy => f.write_str("partial match"),
        }
    }
}

/// A token resolved to its active target.
///
/// `candidates` holds every entity of the winning tier, sorted; the active
/// target is always `candidates[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub token: String,
    pub entity_id: EntityId,
    pub matched_by: MatchKind,
    pub ambiguous: bool,
    pub candidates: Vec<EntityId>,
}

impl ResolvedTarget {
    /// Build a target from one tier's candidates.
    ///
    /// Candidates are sorted and de-duplicated; the lexically smallest id
    /// becomes the active target. Returns `None` for an empty tier.
    #[must_use]
    pub fn from_candidates(
        token: impl Into<String>,
        matched_by: MatchKind,
        mut candidates: Vec<EntityId>,
    ) -> Option<Self> {
        candidates.sort();
        candidates.dedup();
        let entity_id = candidates.first()?.clone();
        Some(Self {
            token: token.into(),
            entity_id,
            matched_by,
            ambiguous: candidates.len() > 1,
            candidates,
        })
    }

    /// Single unambiguous target.
    #[must_use]
    pub fn exact(token: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            token: token.into(),
            candidates: vec![entity_id.clone()],
            entity_id,
            matched_by: MatchKind::ExactId,
            ambiguous: false,
        }
    }

    /// Non-fatal warning for ambiguous matches.
    #[must_use]
    pub fn ambiguity(&self) -> Option<AmbiguousResolution> {
        self.ambiguous.then(|| AmbiguousResolution {
            token: self.token.clone(),
            chosen: self.entity_id.clone(),
            candidates: self.candidates.clone(),
        })
    }
}

/// Several entities of one tier matched the same token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{token:?} matches {} entities, using {chosen}", .candidates.len())]
pub struct AmbiguousResolution {
    pub token: String,
    pub chosen: EntityId,
    pub candidates: Vec<EntityId>,
}

/// Why a token produced no target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Raised instead of the warning when ambiguity is configured to be fatal.
    #[error("{} is ambiguous", .0.token)]
    Ambiguous(AmbiguousResolution),
}

impl ResolutionError {
    /// The token that failed to resolve.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::NotFound(inner) => &inner.token,
            Self::Ambiguous(inner) => &inner.token,
        }
    }
}

/// Outcome of resolving one token.
pub type Resolution = Result<ResolvedTarget, ResolutionError>;
