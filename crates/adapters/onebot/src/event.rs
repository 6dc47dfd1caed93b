//! Inbound OneBot v11 frames: events pushed by the implementation and
//! answers to our actions.

use serde::Deserialize;
use serde_json::Value;

use hassbridge_domain::id::{GroupId, SenderId};
use hassbridge_domain::message::InboundMessage;

/// Any text frame received on the websocket.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    /// Answer to an action we sent, correlated by `echo`.
    Reply(ActionReply),
    GroupMessage(GroupMessage),
    /// Heartbeats, lifecycle, notices, private messages.
    Ignored,
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("echo").is_some() && value.get("status").is_some() {
            return serde_json::from_value(value).map(Self::Reply);
        }
        let is_group_message = value.get("post_type").and_then(Value::as_str) == Some("message")
            && value.get("message_type").and_then(Value::as_str) == Some("group");
        if is_group_message {
            return serde_json::from_value(value).map(Self::GroupMessage);
        }
        Ok(Self::Ignored)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ActionReply {
    pub status: String,
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "id_string")]
    pub echo: String,
}

impl ActionReply {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok") && self.retcode == 0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct GroupMessage {
    #[serde(default, deserialize_with = "id_string")]
    pub message_id: String,
    #[serde(deserialize_with = "id_string")]
    pub group_id: String,
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(default)]
    pub message: Content,
    #[serde(default)]
    pub raw_message: String,
}

/// Message body: a segment array, or a CQ-coded string in string mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Content {
    Segments(Vec<Segment>),
    Raw(String),
}

impl Default for Content {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSegment")]
pub(crate) enum Segment {
    Text { text: String },
    At { qq: String },
    Record { file: String },
    Other,
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl From<RawSegment> for Segment {
    fn from(raw: RawSegment) -> Self {
        let field = |key: &str| match raw.data.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        match raw.kind.as_str() {
            "text" => Self::Text { text: field("text") },
            "at" => Self::At { qq: field("qq") },
            "record" => Self::Record { file: field("file") },
            _ => Self::Other,
        }
    }
}

/// What a group message turned into after mention handling.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Incoming {
    Text(InboundMessage),
    /// A voice message whose audio still has to be fetched with `get_record`.
    Voice {
        sender_id: SenderId,
        group_id: GroupId,
        message_id: Option<String>,
        file: String,
    },
}

/// Mention rules applied to group messages.
#[derive(Debug, Clone, Default)]
pub(crate) struct MentionFilter {
    pub self_id: String,
    pub require_mention: bool,
}

impl MentionFilter {
    fn targets_bot(&self, qq: &str) -> bool {
        qq == "all" || (!self.self_id.is_empty() && qq == self.self_id)
    }
}

impl GroupMessage {
    /// Strip mentions, apply the mention requirement and pick text or voice.
    ///
    /// Returns `None` for messages that should be ignored.
    pub fn into_incoming(self, filter: &MentionFilter) -> Option<Incoming> {
        let sender_id = SenderId::new(self.user_id).ok()?;
        let group_id = GroupId::new(self.group_id).ok()?;
        let message_id = Some(self.message_id).filter(|id| !id.is_empty());

        let (text, mentioned, record) = match self.message {
            Content::Segments(segments) => split_segments(segments, filter),
            Content::Raw(raw) => {
                let source = if raw.is_empty() { self.raw_message } else { raw };
                let (text, mentioned) = strip_cq_at(&source, filter);
                (text, mentioned, None)
            }
        };

        if filter.require_mention && !mentioned {
            tracing::trace!(%group_id, "message does not mention the bot, ignoring");
            return None;
        }

        let text = text.trim();
        if !text.is_empty() {
            let mut message = InboundMessage::text(sender_id, group_id, text);
            message.message_id = message_id;
            return Some(Incoming::Text(message));
        }
        record.map(|file| Incoming::Voice {
            sender_id,
            group_id,
            message_id,
            file,
        })
    }
}

fn split_segments(segments: Vec<Segment>, filter: &MentionFilter) -> (String, bool, Option<String>) {
    let mut text = String::new();
    let mut mentioned = false;
    let mut record = None;
    for segment in segments {
        match segment {
            Segment::Text { text: part } => text.push_str(&part),
            Segment::At { qq } => mentioned |= filter.targets_bot(&qq),
            Segment::Record { file } if record.is_none() && !file.is_empty() => {
                record = Some(file);
            }
            Segment::Record { .. } | Segment::Other => {}
        }
    }
    (text, mentioned, record)
}

/// Remove `[CQ:at,qq=...]` codes from a string-mode message.
fn strip_cq_at(raw: &str, filter: &MentionFilter) -> (String, bool) {
    const OPEN: &str = "[CQ:at,";
    let mut text = String::with_capacity(raw.len());
    let mut mentioned = false;
    let mut rest = raw;
    while let Some(start) = rest.find(OPEN) {
        text.push_str(&rest[..start]);
        let code = &rest[start..];
        let Some(end) = code.find(']') else {
            text.push_str(code);
            rest = "";
            break;
        };
        let qq = code[OPEN.len()..end]
            .split(',')
            .find_map(|pair| pair.strip_prefix("qq="))
            .unwrap_or_default();
        mentioned |= filter.targets_bot(qq);
        rest = &code[end + 1..];
    }
    text.push_str(rest);
    (text, mentioned)
}

/// OneBot implementations send ids as numbers or strings.
fn id_string<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hassbridge_domain::message::MessagePayload;

    fn filter(require_mention: bool) -> MentionFilter {
        MentionFilter {
            self_id: "10001".to_string(),
            require_mention,
        }
    }

    fn group_message(message: &str) -> GroupMessage {
        let json = format!(
            r#"{{"post_type": "message", "message_type": "group", "message_id": 77,
                "group_id": 42, "user_id": 111, "message": {message}, "raw_message": ""}}"#
        );
        match Frame::parse(&json).unwrap() {
            Frame::GroupMessage(message) => message,
            other => panic!("expected group message, got {other:?}"),
        }
    }

    fn text_of(incoming: Option<Incoming>) -> String {
        match incoming {
            Some(Incoming::Text(message)) => match message.payload {
                MessagePayload::Text(text) => text,
                MessagePayload::Voice(_) => panic!("expected text"),
            },
            other => panic!("expected text message, got {other:?}"),
        }
    }

    #[test]
    fn should_parse_group_text_message_with_numeric_ids() {
        let message = group_message(r#"[{"type": "text", "data": {"text": "/turnon desk"}}]"#);

        let Some(Incoming::Text(inbound)) = message.into_incoming(&filter(false)) else {
            panic!("expected text");
        };

        assert_eq!(inbound.sender_id.as_str(), "111");
        assert_eq!(inbound.group_id.as_str(), "42");
        assert_eq!(inbound.message_id.as_deref(), Some("77"));
        assert_eq!(inbound.text_content(), Some("/turnon desk"));
    }

    #[test]
    fn should_strip_mention_segments() {
        let message = group_message(
            r#"[{"type": "at", "data": {"qq": "10001"}}, {"type": "text", "data": {"text": " 开灯"}}]"#,
        );
        assert_eq!(text_of(message.into_incoming(&filter(true))), "开灯");
    }

    #[test]
    fn should_drop_unmentioned_message_when_mention_required() {
        let message = group_message(r#"[{"type": "text", "data": {"text": "hello"}}]"#);
        assert_eq!(message.into_incoming(&filter(true)), None);
    }

    #[test]
    fn should_accept_mention_of_all() {
        let message = group_message(
            r#"[{"type": "at", "data": {"qq": "all"}}, {"type": "text", "data": {"text": "hi"}}]"#,
        );
        assert_eq!(text_of(message.into_incoming(&filter(true))), "hi");
    }

    #[test]
    fn should_strip_cq_codes_in_string_mode() {
        let message = group_message(r#""[CQ:at,qq=10001] /light""#);
        assert_eq!(text_of(message.into_incoming(&filter(true))), "/light");
    }

    #[test]
    fn should_request_voice_when_message_has_no_text() {
        let message = group_message(r#"[{"type": "record", "data": {"file": "abc.amr"}}]"#);

        let incoming = message.into_incoming(&filter(false));

        assert_eq!(
            incoming,
            Some(Incoming::Voice {
                sender_id: SenderId::new("111").unwrap(),
                group_id: GroupId::new("42").unwrap(),
                message_id: Some("77".to_string()),
                file: "abc.amr".to_string(),
            })
        );
    }

    #[test]
    fn should_prefer_text_over_voice() {
        let message = group_message(
            r#"[{"type": "record", "data": {"file": "abc.amr"}}, {"type": "text", "data": {"text": "hi"}}]"#,
        );
        assert_eq!(text_of(message.into_incoming(&filter(false))), "hi");
    }

    #[test]
    fn should_ignore_empty_message() {
        let message = group_message(r#"[{"type": "image", "data": {"file": "x.png"}}]"#);
        assert_eq!(message.into_incoming(&filter(false)), None);
    }

    #[test]
    fn should_ignore_private_messages_and_heartbeats() {
        let private = r#"{"post_type": "message", "message_type": "private", "user_id": 1}"#;
        let heartbeat = r#"{"post_type": "meta_event", "meta_event_type": "heartbeat"}"#;
        assert_eq!(Frame::parse(private).unwrap(), Frame::Ignored);
        assert_eq!(Frame::parse(heartbeat).unwrap(), Frame::Ignored);
    }

    #[test]
    fn should_parse_action_reply() {
        let frame = Frame::parse(
            r#"{"status": "ok", "retcode": 0, "data": {"message_id": 5}, "echo": "e-1"}"#,
        )
        .unwrap();
        let Frame::Reply(reply) = frame else {
            panic!("expected reply");
        };
        assert!(reply.is_ok());
        assert_eq!(reply.echo, "e-1");
    }

    #[test]
    fn should_treat_failed_status_as_error() {
        let frame =
            Frame::parse(r#"{"status": "failed", "retcode": 1404, "echo": "e-2"}"#).unwrap();
        let Frame::Reply(reply) = frame else {
            panic!("expected reply");
        };
        assert!(!reply.is_ok());
    }
}
