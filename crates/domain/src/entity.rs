//! Entity records — the directory's view of automation-platform objects.
//!
//! A record carries everything the resolver and the read-only verbs need:
//! identity, user-facing names, the area it lives in, and a best-effort
//! snapshot of its last known state.

mod attribute_value;
mod state;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use attribute_value::AttributeValue;
pub use state::EntityState;

use crate::error::{BridgeError, ValidationError};
use crate::id::EntityId;

/// UTC timestamp used for snapshots and cache generations.
pub type Timestamp = DateTime<Utc>;

/// Coarse entity category derived from the entity id domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityDomain {
    Light,
    Switch,
    Climate,
    Script,
    Sensor,
    Other,
}

impl EntityDomain {
    /// Classify an entity id domain string.
    #[must_use]
    pub fn from_domain_str(domain: &str) -> Self {
        match domain {
            "light" => Self::Light,
            "switch" => Self::Switch,
            "climate" => Self::Climate,
            "script" => Self::Script,
            "sensor" => Self::Sensor,
            _ => Self::Other,
        }
    }
}

impl From<&EntityId> for EntityDomain {
    fn from(id: &EntityId) -> Self {
        Self::from_domain_str(id.domain())
    }
}

impl fmt::Display for EntityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::Switch => f.write_str("switch"),
            Self::Climate => f.write_str("climate"),
            Self::Script => f.write_str("script"),
            Self::Sensor => f.write_str("sensor"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// Last known state of an entity. Freshness is best effort: it is whatever
/// the platform reported when the cache generation was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: EntityState,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
    pub observed_at: Timestamp,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            state: EntityState::Unknown,
            attributes: HashMap::new(),
            observed_at: Utc::now(),
        }
    }
}

impl StateSnapshot {
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// One addressable automation-platform object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: EntityId,
    pub friendly_name: String,
    /// User-configured alternate names, in configuration order.
    pub aliases: Vec<String>,
    pub domain: EntityDomain,
    pub area: Option<String>,
    pub state: StateSnapshot,
}

impl EntityRecord {
    /// Create a builder for constructing an [`EntityRecord`].
    #[must_use]
    pub fn builder() -> EntityRecordBuilder {
        EntityRecordBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyFriendlyName`] when the friendly name is
    /// blank.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.friendly_name.trim().is_empty() {
            return Err(ValidationError::EmptyFriendlyName.into());
        }
        Ok(())
    }

    /// Friendly name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.friendly_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether the entity currently reports `on`.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state.state == EntityState::On
    }
}

/// Step-by-step builder for [`EntityRecord`].
#[derive(Debug, Default)]
pub struct EntityRecordBuilder {
    entity_id: Option<String>,
    friendly_name: Option<String>,
    aliases: Vec<String>,
    area: Option<String>,
    state: Option<EntityState>,
    attributes: HashMap<String, AttributeValue>,
    observed_at: Option<Timestamp>,
}

impl EntityRecordBuilder {
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: EntityState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn observed_at(mut self, ts: Timestamp) -> Self {
        self.observed_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`EntityRecord`].
    ///
    /// When no friendly name is given the object id is used, which is what
    /// the platform shows for unnamed entities.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if the entity id is missing or
    /// malformed.
    pub fn build(self) -> Result<EntityRecord, BridgeError> {
        let raw_id = self.entity_id.unwrap_or_default();
        let entity_id = EntityId::parse(&raw_id)?;
        let friendly_name = self
            .friendly_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| entity_id.object_id().to_string());
        let aliases = self
            .aliases
            .into_iter()
            .map(|alias| alias.trim().to_string())
            .filter(|alias| !alias.is_empty())
            .collect();
        let record = EntityRecord {
            domain: EntityDomain::from(&entity_id),
            entity_id,
            friendly_name,
            aliases,
            area: self.area.filter(|area| !area.trim().is_empty()),
            state: StateSnapshot {
                state: self.state.unwrap_or_default(),
                attributes: self.attributes,
                observed_at: self.observed_at.unwrap_or_else(Utc::now),
            },
        };
        record.validate()?;
        Ok(record)
    }
}
