//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hassbridge.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use hassbridge_adapter_homeassistant::HomeAssistantConfig;
use hassbridge_adapter_onebot::OneBotConfig;
use hassbridge_adapter_tencent_asr::TencentAsrConfig;
use hassbridge_app::dispatcher::{DispatchSettings, VoiceSettings};
use hassbridge_app::services::{AliasTable, AmbiguityPolicy};
use hassbridge_domain::command::DEFAULT_MARKER;
use hassbridge_domain::id::{EntityId, GroupId, SenderId};

pub const CONFIG_FILE: &str = "hassbridge.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub commands: CommandsConfig,
    pub permissions: PermissionsConfig,
    pub resolver: ResolverConfig,
    /// Extra names per entity id, merged into every directory generation.
    pub aliases: HashMap<String, Vec<String>>,
    pub cache: CacheConfig,
    pub dispatch: DispatchConfig,
    /// Absent means the virtual platform is used.
    pub homeassistant: Option<HomeAssistantConfig>,
    pub onebot: OneBotConfig,
    /// Absent means voice messages are skipped.
    pub voice: Option<VoiceConfig>,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Leading marker of structured commands.
    pub marker: String,
}

/// Allow-lists; an empty list lets everyone through.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub allowed_senders: Vec<String>,
    pub allowed_groups: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fail targets that match several entities instead of picking the first.
    pub reject_ambiguous: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds between directory refreshes; `0` disables periodic refresh.
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Timeout applied to every external call.
    pub call_timeout_secs: u64,
    /// Per-group queue size.
    pub mailbox_capacity: usize,
}

/// Tencent credentials plus the recognition engine and region.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    #[serde(flatten)]
    pub asr: TencentAsrConfig,
    pub engine: String,
    pub region: String,
}

/// Webhook HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Shared token callers must send; empty disables the check.
    pub token: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `hassbridge.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(val) = env("HASSBRIDGE_HA_URL") {
            self.homeassistant.get_or_insert_with(Default::default).url = val;
        }
        if let Some(val) = env("HASSBRIDGE_HA_TOKEN") {
            self.homeassistant.get_or_insert_with(Default::default).token = val;
        }
        if let Some(val) = env("HASSBRIDGE_HA_AGENT_ID") {
            self.homeassistant.get_or_insert_with(Default::default).agent_id = val;
        }
        if let Some(val) = env("HASSBRIDGE_ONEBOT_URL") {
            self.onebot.url = val;
        }
        if let Some(val) = env("HASSBRIDGE_ALLOWED_SENDERS") {
            self.permissions.allowed_senders = split_list(&val);
        }
        if let Some(val) = env("HASSBRIDGE_ALLOWED_GROUPS") {
            self.permissions.allowed_groups = split_list(&val);
        }
        if let Some(val) = env("HASSBRIDGE_WEBHOOK_TOKEN") {
            self.webhook.token = val;
        }
        if let Some(val) = env("HASSBRIDGE_WEBHOOK_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.webhook.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.webhook.port = port;
                }
            }
        }
        if let Some(val) = env("HASSBRIDGE_TENCENT_SECRET_ID") {
            self.voice.get_or_insert_with(Default::default).asr.secret_id = val;
        }
        if let Some(val) = env("HASSBRIDGE_TENCENT_SECRET_KEY") {
            self.voice.get_or_insert_with(Default::default).asr.secret_key = val;
        }
        if let Some(val) = env("HASSBRIDGE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.commands.marker.trim().is_empty() {
            return Err(ConfigError::Validation("command marker must not be empty".to_string()));
        }
        if self.webhook.port == 0 {
            return Err(ConfigError::Validation("webhook port must be non-zero".to_string()));
        }
        if self.dispatch.call_timeout_secs == 0 {
            return Err(ConfigError::Validation("call timeout must be non-zero".to_string()));
        }
        if self
            .homeassistant
            .as_ref()
            .is_some_and(|ha| ha.token.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "[homeassistant] requires a non-empty token".to_string(),
            ));
        }
        if self.voice.as_ref().is_some_and(|voice| !voice.asr.has_credentials()) {
            return Err(ConfigError::Validation(
                "[voice] requires secret_id and secret_key".to_string(),
            ));
        }
        self.alias_table()?;
        Ok(())
    }

    /// Return the webhook `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.webhook.host, self.webhook.port)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.call_timeout_secs)
    }

    /// `None` when periodic refresh is disabled.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.cache.refresh_interval_secs > 0)
            .then(|| Duration::from_secs(self.cache.refresh_interval_secs))
    }

    /// Aliases keyed by parsed entity id.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first malformed entity id.
    pub fn alias_table(&self) -> Result<AliasTable, ConfigError> {
        self.aliases
            .iter()
            .map(|(raw, names)| {
                EntityId::parse(raw)
                    .map(|id| (id, names.clone()))
                    .map_err(|err| ConfigError::Validation(format!("[aliases] {err}")))
            })
            .collect()
    }

    /// Router settings derived from this configuration.
    #[must_use]
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            marker: self.commands.marker.trim().to_string(),
            allowed_senders: self
                .permissions
                .allowed_senders
                .iter()
                .filter_map(|raw| SenderId::new(raw.as_str()).ok())
                .collect(),
            allowed_groups: self
                .permissions
                .allowed_groups
                .iter()
                .filter_map(|raw| GroupId::new(raw.as_str()).ok())
                .collect(),
            ambiguity: if self.resolver.reject_ambiguous {
                AmbiguityPolicy::Reject
            } else {
                AmbiguityPolicy::FirstMatch
            },
            call_timeout: self.call_timeout(),
            voice: self.voice.as_ref().map_or_else(VoiceSettings::default, |voice| VoiceSettings {
                engine: voice.engine.clone(),
                region: voice.region.clone(),
            }),
        }
    }
}

/// Comma or whitespace separated list.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 30,
            mailbox_capacity: 64,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let defaults = VoiceSettings::default();
        Self {
            asr: TencentAsrConfig::default(),
            engine: defaults.engine,
            region: defaults.region,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            token: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hassbridged=info,hassbridge=info,tower_http=debug".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
