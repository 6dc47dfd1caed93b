//! Home Assistant connection configuration.

use serde::Deserialize;

/// Configuration for the Home Assistant REST API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://homeassistant:8123`.
    pub url: String,
    /// Long-lived access token.
    pub token: String,
    /// Conversation agent used for natural language; the platform default when empty.
    pub agent_id: String,
    /// Language hint for the conversation agent.
    pub language: Option<String>,
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            url: "http://homeassistant:8123".to_string(),
            token: String::new(),
            agent_id: "conversation.home_assistant".to_string(),
            language: None,
        }
    }
}

impl HomeAssistantConfig {
    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = HomeAssistantConfig::default();
        assert_eq!(config.url, "http://homeassistant:8123");
        assert!(config.token.is_empty());
        assert_eq!(config.agent_id, "conversation.home_assistant");
        assert_eq!(config.language, None);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            url = "http://10.0.0.2:8123/"
            token = "abc"
            agent_id = "conversation.ollama"
            language = "zh"
        "#;
        let config: HomeAssistantConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url(), "http://10.0.0.2:8123");
        assert_eq!(config.token, "abc");
        assert_eq!(config.agent_id, "conversation.ollama");
        assert_eq!(config.language.as_deref(), Some("zh"));
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: HomeAssistantConfig = toml::from_str(r#"token = "abc""#).unwrap();
        assert_eq!(config.url, "http://homeassistant:8123");
        assert_eq!(config.agent_id, "conversation.home_assistant");
    }
}
