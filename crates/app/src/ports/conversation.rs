//! Conversation port — forwards natural language to an external agent.

use std::future::Future;
use std::sync::Arc;

use hassbridge_domain::error::BridgeError;

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRequest {
    pub text: String,
    /// Opaque session id returned by the previous turn of the same group.
    pub session_id: Option<String>,
}

/// The agent's answer and the session id to use next time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationReply {
    pub text: String,
    pub session_id: Option<String>,
}

/// An external conversational agent.
pub trait ConversationAgent: Send + Sync {
    fn converse(
        &self,
        request: ConversationRequest,
    ) -> impl Future<Output = Result<ConversationReply, BridgeError>> + Send;
}

impl<T: ConversationAgent> ConversationAgent for Arc<T> {
    fn converse(
        &self,
        request: ConversationRequest,
    ) -> impl Future<Output = Result<ConversationReply, BridgeError>> + Send {
        (**self).converse(request)
    }
}
