//! JSON shapes of the Home Assistant REST API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hassbridge_domain::entity::{AttributeValue, EntityRecord, EntityState};
use hassbridge_domain::error::BridgeError;

/// Renders `{"entities": [{"entity_id": ..., "area": ...}]}` for every state.
pub(crate) const AREA_TEMPLATE: &str = r#"{"entities": [
{%- for entity_id in states | map(attribute='entity_id') | list -%}
{"entity_id": "{{ entity_id }}", "area": "{{ area_name(entity_id) if area_name(entity_id) else '' }}"}
{%- if not loop.last -%},{%- endif -%}
{%- endfor -%}
]}"#;

/// One element of `GET /api/states` (and of a service call response).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StateObject {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StateObject {
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }

    pub fn into_record(self, area: Option<&str>) -> Result<EntityRecord, BridgeError> {
        let mut builder = EntityRecord::builder()
            .entity_id(self.entity_id.as_str())
            .state(EntityState::from(self.state.as_str()));
        if let Some(name) = self.friendly_name() {
            builder = builder.friendly_name(name);
        }
        if let Some(area) = area {
            builder = builder.area(area);
        }
        if let Some(ts) = self.last_updated {
            builder = builder.observed_at(ts);
        }
        for (key, value) in self.attributes {
            if key != "friendly_name" {
                builder = builder.attribute(key, AttributeValue::from(value));
            }
        }
        builder.build()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TemplateRequest<'a> {
    pub template: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AreaListing {
    #[serde(default)]
    pub entities: Vec<AreaEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AreaEntry {
    pub entity_id: String,
    #[serde(default)]
    pub area: String,
}

impl AreaListing {
    /// `entity_id -> area`, skipping entities without an area.
    pub fn into_map(self) -> HashMap<String, String> {
        self.entities
            .into_iter()
            .filter(|entry| !entry.area.trim().is_empty())
            .map(|entry| (entry.entity_id, entry.area))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ConversationPayload<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<&'a str>,
}

/// Response of `POST /api/conversation/process`.
#[derive(Debug, Deserialize)]
pub(crate) struct ConversationResult {
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub speech: Option<Value>,
}

impl ConversationResult {
    /// Spoken text, from `response.speech.plain.speech` or one of the
    /// shorter shapes some agents return.
    pub fn speech(&self) -> String {
        let nested = self.response.get("speech").or(self.speech.as_ref());
        let text = match nested {
            Some(Value::String(text)) => Some(text.as_str()),
            Some(speech) => match speech.get("plain") {
                Some(Value::String(text)) => Some(text.as_str()),
                Some(plain) => plain.get("speech").and_then(Value::as_str),
                None => None,
            },
            None => None,
        };
        text.unwrap_or_default().to_string()
    }
}
