//! Echoing conversation agent.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use hassbridge_app::ports::{ConversationAgent, ConversationReply, ConversationRequest};
use hassbridge_domain::error::BridgeError;

/// Answers every turn with the text it received.
///
/// A new session id is issued on the first turn and kept for later turns
/// that pass it back.
#[derive(Debug, Default)]
pub struct EchoAgent {
    sessions: AtomicU64,
}

impl ConversationAgent for EchoAgent {
    fn converse(
        &self,
        request: ConversationRequest,
    ) -> impl Future<Output = Result<ConversationReply, BridgeError>> + Send {
        let session_id = request.session_id.unwrap_or_else(|| {
            let n = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
            format!("virtual-{n}")
        });
        std::future::ready(Ok(ConversationReply {
            text: format!("You said: {}", request.text),
            session_id: Some(session_id),
        }))
    }
}
