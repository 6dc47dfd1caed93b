//! Typed identifier newtypes backed by strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Separator between the domain and the object id in an [`EntityId`].
pub const DOMAIN_SEPARATOR: char = '.';

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier, rejecting blank input.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::EmptyIdentifier`] when `raw` is blank.
            pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyIdentifier);
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

define_id!(
    /// Chat account that sent an inbound message.
    SenderId
);

define_id!(
    /// Chat group a message was posted in; the unit of reply routing.
    GroupId
);

/// Automation-platform entity identifier of the form `domain.object_id`.
///
/// Always stored lowercase. Construction fails unless both halves are
/// non-empty and contain only ASCII alphanumerics or `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse and normalise an entity id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedEntityId`] when `raw` is not of the
    /// form `domain.object_id`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_ascii_lowercase();
        let Some((domain, object_id)) = normalized.split_once(DOMAIN_SEPARATOR) else {
            return Err(ValidationError::MalformedEntityId(raw.to_string()));
        };
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !valid_part(domain) || !valid_part(object_id) {
            return Err(ValidationError::MalformedEntityId(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Build `domain.object_id` from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedEntityId`] if either part is invalid.
    pub fn from_parts(domain: &str, object_id: &str) -> Result<Self, ValidationError> {
        Self::parse(&format!("{domain}{DOMAIN_SEPARATOR}{object_id}"))
    }

    /// The part before the separator (`light` in `light.kitchen`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0
            .split_once(DOMAIN_SEPARATOR)
            .map_or(self.0.as_str(), |(domain, _)| domain)
    }

    /// The part after the separator (`kitchen` in `light.kitchen`).
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.0
            .split_once(DOMAIN_SEPARATOR)
            .map_or("", |(_, object_id)| object_id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_well_formed_entity_id() {
        let id = EntityId::parse("light.living_room").unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "living_room");
    }

    #[test]
    fn should_lowercase_entity_id() {
        let id = EntityId::parse("  Light.Kitchen ").unwrap();
        assert_eq!(id.as_str(), "light.kitchen");
    }

    #[test]
    fn should_reject_entity_id_without_separator() {
        let result = EntityId::parse("kitchen");
        assert!(matches!(result, Err(ValidationError::MalformedEntityId(_))));
    }

    #[test]
    fn should_reject_entity_id_with_spaces() {
        assert!(EntityId::parse("Mr. Light").is_err());
    }

    #[test]
    fn should_reject_entity_id_with_empty_half() {
        assert!(EntityId::parse("light.").is_err());
        assert!(EntityId::parse(".kitchen").is_err());
    }

    #[test]
    fn should_build_entity_id_from_parts() {
        let id = EntityId::from_parts("script", "good_night").unwrap();
        assert_eq!(id.as_str(), "script.good_night");
    }

    #[test]
    fn should_order_entity_ids_lexically() {
        let a = EntityId::parse("light.a").unwrap();
        let b = EntityId::parse("light.b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn should_roundtrip_entity_id_through_serde_json() {
        let id = EntityId::parse("switch.fan").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.fan\"");
        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_reject_malformed_entity_id_when_deserializing() {
        let result: Result<EntityId, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_blank_sender_id() {
        assert!(matches!(
            SenderId::new("   "),
            Err(ValidationError::EmptyIdentifier)
        ));
    }

    #[test]
    fn should_trim_group_id() {
        let id = GroupId::new(" 123456 ").unwrap();
        assert_eq!(id.as_str(), "123456");
    }
}
