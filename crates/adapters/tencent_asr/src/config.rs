//! Tencent Cloud ASR configuration.

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://asr.tencentcloudapi.com";

/// Credentials and endpoint for sentence recognition.
///
/// The recognition engine and region travel with each request.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TencentAsrConfig {
    pub secret_id: String,
    pub secret_key: String,
    pub endpoint: String,
}

impl Default for TencentAsrConfig {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl TencentAsrConfig {
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.secret_id.trim().is_empty() && !self.secret_key.trim().is_empty()
    }
}

impl std::fmt::Debug for TencentAsrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencentAsrConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
