//! Outbound OneBot v11 action frames.

use serde::Serialize;
use serde_json::{Value, json};

use hassbridge_domain::message::{OutboundReply, ReplyBody};

/// `{"action": ..., "params": ..., "echo": ...}`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ActionFrame {
    pub action: String,
    pub params: Value,
    pub echo: String,
}

impl ActionFrame {
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        Self {
            action: action.into(),
            params,
            echo: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// `send_group_msg` params for a reply: optional `reply` segment, then text
/// and media segments.
pub(crate) fn send_group_msg(reply: &OutboundReply) -> Value {
    let mut segments = Vec::new();
    if let Some(message_id) = &reply.reply_to {
        segments.push(json!({"type": "reply", "data": {"id": message_id}}));
    }
    match &reply.body {
        ReplyBody::Text { text } => {
            segments.push(json!({"type": "text", "data": {"text": text}}));
        }
        ReplyBody::Media { text, media } => {
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                segments.push(json!({"type": "text", "data": {"text": text}}));
            }
            segments.push(json!({"type": "video", "data": {"file": media.url}}));
        }
    }
    json!({
        "group_id": reply.group_id.as_str(),
        "message": segments,
    })
}

pub(crate) fn get_record(file: &str) -> Value {
    json!({"file": file, "out_format": "mp3"})
}

#[cfg(test)]
mod tests {
    use super::*;
    use hassbridge_domain::id::GroupId;
    use hassbridge_domain::message::MediaAttachment;

    fn group() -> GroupId {
        GroupId::new("42").unwrap()
    }

    #[test]
    fn should_prefix_reply_segment_when_threaded() {
        let reply = OutboundReply::text(group(), "done").in_reply_to(Some("77".to_string()));

        let params = send_group_msg(&reply);

        assert_eq!(
            params,
            json!({
                "group_id": "42",
                "message": [
                    {"type": "reply", "data": {"id": "77"}},
                    {"type": "text", "data": {"text": "done"}}
                ]
            })
        );
    }

    #[test]
    fn should_send_plain_text_without_reply_segment() {
        let params = send_group_msg(&OutboundReply::text(group(), "hi"));
        assert_eq!(params["message"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn should_forward_media_by_url() {
        let reply = OutboundReply::media(
            group(),
            Some("doorbell".to_string()),
            MediaAttachment {
                url: "http://nvr/clip.mp4".to_string(),
                duration: Some(10),
            },
        );

        let params = send_group_msg(&reply);

        assert_eq!(params["message"][0]["data"]["text"], "doorbell");
        assert_eq!(params["message"][1]["type"], "video");
        assert_eq!(params["message"][1]["data"]["file"], "http://nvr/clip.mp4");
    }

    #[test]
    fn should_use_fresh_echo_per_frame() {
        let a = ActionFrame::new("get_status", json!({}));
        let b = ActionFrame::new("get_status", json!({}));
        assert_ne!(a.echo, b.echo);
    }
}
