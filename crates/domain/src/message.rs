//! Chat messages crossing the transport boundary.

use serde::{Deserialize, Serialize};

use crate::id::{GroupId, SenderId};

/// Raw audio attached to a voice message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceClip {
    pub audio: Vec<u8>,
    /// Container format as understood by the transcription vendor (`mp3`, `silk`, `wav`, ...).
    pub format: String,
}

impl std::fmt::Debug for VoiceClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceClip")
            .field("audio", &format_args!("{} bytes", self.audio.len()))
            .field("format", &self.format)
            .finish()
    }
}

/// Body of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MessagePayload {
    Text(String),
    Voice(VoiceClip),
}

/// A message received from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender_id: SenderId,
    pub group_id: GroupId,
    /// Transport message id, used to thread the reply.
    pub message_id: Option<String>,
    pub payload: MessagePayload,
}

impl InboundMessage {
    #[must_use]
    pub fn text(sender_id: SenderId, group_id: GroupId, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            group_id,
            message_id: None,
            payload: MessagePayload::Text(text.into()),
        }
    }

    #[must_use]
    pub fn voice(sender_id: SenderId, group_id: GroupId, clip: VoiceClip) -> Self {
        Self {
            sender_id,
            group_id,
            message_id: None,
            payload: MessagePayload::Voice(clip),
        }
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// The text payload, if this is a text message.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::Text(text) => Some(text),
            MessagePayload::Voice(_) => None,
        }
    }

    #[must_use]
    pub fn is_voice(&self) -> bool {
        matches!(self.payload, MessagePayload::Voice(_))
    }
}

/// Media attached to an outbound reply, forwarded by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub url: String,
    /// Duration in seconds, when known.
    pub duration: Option<u32>,
}

/// Body of an outbound reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyBody {
    Text { text: String },
    Media {
        text: Option<String>,
        media: MediaAttachment,
    },
}

/// A reply sent to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub group_id: GroupId,
    /// Inbound message this reply answers.
    pub reply_to: Option<String>,
    pub body: ReplyBody,
}

impl OutboundReply {
    #[must_use]
    pub fn text(group_id: GroupId, text: impl Into<String>) -> Self {
        Self {
            group_id,
            reply_to: None,
            body: ReplyBody::Text { text: text.into() },
        }
    }

    #[must_use]
    pub fn media(group_id: GroupId, text: Option<String>, media: MediaAttachment) -> Self {
        Self {
            group_id,
            reply_to: None,
            body: ReplyBody::Media { text, media },
        }
    }

    #[must_use]
    pub fn in_reply_to(mut self, message_id: Option<String>) -> Self {
        self.reply_to = message_id;
        self
    }

    /// Text part of the reply, if any.
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            ReplyBody::Text { text } => Some(text),
            ReplyBody::Media { text, .. } => text.as_deref(),
        }
    }
}

/// Who is asking, and whether the allow-list lets them mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderContext {
    pub sender_id: SenderId,
    pub group_id: GroupId,
    pub is_permitted: bool,
}
