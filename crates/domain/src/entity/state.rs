//! Entity state — the last reported operational state of an entity.

use serde::{Deserialize, Serialize};

/// Discrete operational state, with a catch-all for free-form values such
/// as sensor readings (`"21.5"`) or climate modes (`"cool"`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityState {
    On,
    Off,
    #[default]
    Unknown,
    Unavailable,
    Value(String),
}

impl EntityState {
    /// Whether the entity is reachable (anything but [`Unavailable`](Self::Unavailable)).
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    /// Interpret the state as a number, if it is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(raw) => raw.trim().parse().ok().filter(|v: &f64| v.is_finite()),
            _ => None,
        }
    }
}

impl From<&str> for EntityState {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            "" | "unknown" => Self::Unknown,
            "unavailable" => Self::Unavailable,
            _ => Self::Value(raw.trim().to_string()),
        }
    }
}

impl From<String> for EntityState {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<EntityState> for String {
    fn from(state: EntityState) -> Self {
        state.to_string()
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
            Self::Unavailable => f.write_str("unavailable"),
            Self::Value(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_on_case_insensitively() {
        assert_eq!(EntityState::from("ON"), EntityState::On);
    }

    #[test]
    fn should_treat_empty_string_as_unknown() {
        assert_eq!(EntityState::from(""), EntityState::Unknown);
    }

    #[test]
    fn should_keep_free_form_values() {
        assert_eq!(
            EntityState::from("heat_cool"),
            EntityState::Value("heat_cool".to_string())
        );
    }

    #[test]
    fn should_report_unavailable_when_state_is_unavailable() {
        assert!(!EntityState::Unavailable.is_available());
        assert!(EntityState::Off.is_available());
    }

    #[test]
    fn should_read_numeric_sensor_value() {
        assert_eq!(EntityState::from("21.5").as_f64(), Some(21.5));
        assert_eq!(EntityState::On.as_f64(), None);
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let json = serde_json::to_string(&EntityState::Value("23".to_string())).unwrap();
        assert_eq!(json, "\"23\"");
        let parsed: EntityState = serde_json::from_str("\"off\"").unwrap();
        assert_eq!(parsed, EntityState::Off);
    }
}
