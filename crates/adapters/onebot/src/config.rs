//! OneBot connection configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the OneBot v11 websocket.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OneBotConfig {
    /// Websocket URL of the OneBot implementation (NapCat), e.g. `ws://napcat:3001`.
    pub url: String,
    /// Sent as a bearer token when non-empty.
    pub access_token: String,
    /// Bot account id, used for mention detection.
    pub self_id: String,
    /// Drop group messages that do not mention the bot.
    pub require_mention: bool,
    /// How long to wait for the answer to an action, in seconds.
    pub action_timeout_secs: u64,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            url: "ws://napcat:3001".to_string(),
            access_token: String::new(),
            self_id: String::new(),
            require_mention: false,
            action_timeout_secs: 15,
        }
    }
}

impl OneBotConfig {
    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs.max(1))
    }

    /// HTTP origin of the same host, used to download files that actions
    /// return as relative paths.
    #[must_use]
    pub fn http_base(&self) -> String {
        let (scheme, rest) = match self.url.split_once("://") {
            Some(("wss" | "https", rest)) => ("https", rest),
            Some((_, rest)) => ("http", rest),
            None => ("http", self.url.as_str()),
        };
        let authority = rest.split('/').next().unwrap_or_default();
        format!("{scheme}://{authority}")
    }
}
