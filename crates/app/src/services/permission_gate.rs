//! Permission gate — sender and group allow-lists.

use std::collections::HashSet;

use hassbridge_domain::command::Verb;
use hassbridge_domain::error::PermissionDenied;
use hassbridge_domain::id::{GroupId, SenderId};
use hassbridge_domain::message::SenderContext;

/// Sender allow-list for gated verbs and group allow-list for the whole bridge.
///
/// An empty list admits everyone.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    allowed_senders: HashSet<SenderId>,
    allowed_groups: HashSet<GroupId>,
}

impl PermissionGate {
    #[must_use]
    pub fn new(
        allowed_senders: impl IntoIterator<Item = SenderId>,
        allowed_groups: impl IntoIterator<Item = GroupId>,
    ) -> Self {
        Self {
            allowed_senders: allowed_senders.into_iter().collect(),
            allowed_groups: allowed_groups.into_iter().collect(),
        }
    }

    /// Whether `sender_id` may run `verb`. Read-only verbs are always allowed.
    #[must_use]
    pub fn authorize(&self, sender_id: &SenderId, verb: Verb) -> bool {
        !verb.requires_permission() || self.is_permitted(sender_id)
    }

    /// Like [`authorize`](Self::authorize), as a typed error.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionDenied`] when the sender is not on a non-empty allow-list.
    pub fn check(&self, sender_id: &SenderId, verb: Verb) -> Result<(), PermissionDenied> {
        if self.authorize(sender_id, verb) {
            Ok(())
        } else {
            tracing::info!(%sender_id, %verb, "permission denied");
            Err(PermissionDenied {
                sender_id: sender_id.to_string(),
                verb: verb.to_string(),
            })
        }
    }

    /// Whether the sender passes the allow-list for gated verbs.
    #[must_use]
    pub fn is_permitted(&self, sender_id: &SenderId) -> bool {
        self.allowed_senders.is_empty() || self.allowed_senders.contains(sender_id)
    }

    /// Whether messages from `group_id` are served at all.
    #[must_use]
    pub fn admits_group(&self, group_id: &GroupId) -> bool {
        self.allowed_groups.is_empty() || self.allowed_groups.contains(group_id)
    }

    #[must_use]
    pub fn sender_context(&self, sender_id: &SenderId, group_id: &GroupId) -> SenderContext {
        SenderContext {
            sender_id: sender_id.clone(),
            group_id: group_id.clone(),
            is_permitted: self.is_permitted(sender_id),
        }
    }
}
