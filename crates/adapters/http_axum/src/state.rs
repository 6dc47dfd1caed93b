//! Shared application state for axum handlers.

use std::sync::Arc;

use hassbridge_app::ports::ReplySink;

/// State shared by the webhook handlers.
///
/// Generic over the reply sink to avoid dynamic dispatch. `Clone` is
/// implemented manually so the sink itself does not need to be `Clone`.
pub struct WebhookState<S> {
    pub sink: Arc<S>,
    /// Required `token` field of every request; `None` disables the check.
    pub token: Option<String>,
}

impl<S> Clone for WebhookState<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            token: self.token.clone(),
        }
    }
}

impl<S: ReplySink + 'static> WebhookState<S> {
    /// An empty token disables the check.
    pub fn new(sink: Arc<S>, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            sink,
            token: Some(token).filter(|t| !t.is_empty()),
        }
    }

    /// Whether a request carrying `given` is allowed through.
    #[must_use]
    pub fn accepts(&self, given: Option<&str>) -> bool {
        match &self.token {
            Some(expected) => given == Some(expected.as_str()),
            None => true,
        }
    }
}
