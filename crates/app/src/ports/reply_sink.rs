//! Reply sink port — the outbound half of the chat transport.

use std::future::Future;
use std::sync::Arc;

use hassbridge_domain::error::BridgeError;
use hassbridge_domain::message::OutboundReply;

/// Delivers replies to a chat group.
///
/// Used by the dispatch router and by the webhook transport.
pub trait ReplySink: Send + Sync {
    fn send_reply(
        &self,
        reply: OutboundReply,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

impl<T: ReplySink> ReplySink for Arc<T> {
    fn send_reply(
        &self,
        reply: OutboundReply,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send {
        (**self).send_reply(reply)
    }
}
