//! Resolver — maps a user token onto an entity of a directory generation.
//!
//! Tiers are tried in priority order and the first non-empty one wins:
//!
//! 1. a well-formed entity id (`domain.object_id`)
//! 2. exact friendly name, ignoring case
//! 3. exact alias, ignoring case
//! 4. friendly name or alias containing the token, ignoring case
//!
//! Within a tier the lexically smallest entity id is the active target and
//! every same-tier match is reported as a candidate.

use hassbridge_domain::error::NotFoundError;
use hassbridge_domain::id::{DOMAIN_SEPARATOR, EntityId};
use hassbridge_domain::resolution::{MatchKind, Resolution, ResolutionError, ResolvedTarget};

use crate::services::directory_cache::Generation;

/// What to do when a tier yields several entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Use the smallest id and attach a warning.
    #[default]
    FirstMatch,
    /// Fail the target.
    Reject,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    policy: AmbiguityPolicy,
}

impl Resolver {
    #[must_use]
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    /// Resolve one token against `generation`.
    ///
    /// A token containing the domain separator that parses as an entity id
    /// always resolves through tier 1, even when the id is not cached: the
    /// platform is the authority on which ids exist.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::NotFound`] when no tier yields a candidate
    /// - [`ResolutionError::Ambiguous`] for several candidates under [`AmbiguityPolicy::Reject`]
    pub fn resolve(&self, generation: &Generation, token: &str) -> Resolution {
        let token = token.trim();

        if token.contains(DOMAIN_SEPARATOR) {
            if let Ok(id) = EntityId::parse(token) {
                if generation.lookup_by_id(&id).is_none() {
                    tracing::debug!(entity_id = %id, "entity id not in directory, passing through");
                }
                return Ok(ResolvedTarget::exact(token, id));
            }
        }

        let tiers = [
            (MatchKind::FriendlyName, generation.ids_by_name(token).to_vec()),
            (MatchKind::Alias, generation.ids_by_alias(token).to_vec()),
        ];
        let found = tiers
            .into_iter()
            .find_map(|(kind, ids)| ResolvedTarget::from_candidates(token, kind, ids))
            .or_else(|| {
                ResolvedTarget::from_candidates(
                    token,
                    MatchKind::Fuzzy,
                    generation.ids_containing(token),
                )
            });

        let Some(target) = found else {
            return Err(NotFoundError {
                token: token.to_string(),
            }
            .into());
        };

        match (target.ambiguity(), self.policy) {
            (Some(ambiguity), AmbiguityPolicy::Reject) => Err(ResolutionError::Ambiguous(ambiguity)),
            (Some(ambiguity), AmbiguityPolicy::FirstMatch) => {
                tracing::warn!(
                    token = %ambiguity.token,
                    chosen = %ambiguity.chosen,
                    candidates = ambiguity.candidates.len(),
                    "ambiguous token, using first match"
                );
                Ok(target)
            }
            (None, _) => Ok(target),
        }
    }

    /// Resolve every token independently, preserving order.
    #[must_use]
    pub fn resolve_all<S: AsRef<str>>(&self, generation: &Generation, tokens: &[S]) -> Vec<Resolution> {
        tokens
            .iter()
            .map(|token| self.resolve(generation, token.as_ref()))
            .collect()
    }
}
