//! Notification webhooks called by Home Assistant automations.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use hassbridge_app::ports::ReplySink;
use hassbridge_domain::id::GroupId;
use hassbridge_domain::message::{MediaAttachment, OutboundReply};

use crate::error::WebhookError;
use crate::state::WebhookState;

/// Request body of `POST /webhook/notify`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotifyRequest {
    pub group_id: String,
    pub message: String,
    pub token: Option<String>,
}

/// Request body of `POST /webhook/multimodal`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MultimodalRequest {
    pub group_id: String,
    pub message: Option<String>,
    pub media_url: Option<String>,
    /// Clip length in seconds, passed through to the chat transport.
    pub duration: Option<u32>,
    pub token: Option<String>,
}

/// Possible responses from the webhook endpoints.
pub enum SendResponse {
    Sent,
}

impl IntoResponse for SendResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Sent => Json(serde_json::json!({
                "status": "ok",
                "message": "Notification sent",
            }))
            .into_response(),
        }
    }
}

/// `POST /webhook/notify`
pub async fn notify<S>(
    State(state): State<WebhookState<S>>,
    Json(req): Json<NotifyRequest>,
) -> Result<SendResponse, WebhookError>
where
    S: ReplySink + 'static,
{
    if !state.accepts(req.token.as_deref()) {
        tracing::warn!(group_id = %req.group_id, "rejecting notification with invalid token");
        return Err(WebhookError::Unauthorized);
    }
    let group_id = group_id(&req.group_id)?;
    if req.message.trim().is_empty() {
        return Err(WebhookError::MissingField("message"));
    }

    deliver(&state, OutboundReply::text(group_id, req.message)).await
}

/// `POST /webhook/multimodal`
pub async fn multimodal<S>(
    State(state): State<WebhookState<S>>,
    Json(req): Json<MultimodalRequest>,
) -> Result<SendResponse, WebhookError>
where
    S: ReplySink + 'static,
{
    if !state.accepts(req.token.as_deref()) {
        tracing::warn!(group_id = %req.group_id, "rejecting notification with invalid token");
        return Err(WebhookError::Unauthorized);
    }
    let group_id = group_id(&req.group_id)?;
    let text = req.message.filter(|m| !m.trim().is_empty());
    let media_url = req.media_url.filter(|u| !u.trim().is_empty());

    let reply = match (text, media_url) {
        (text, Some(url)) => OutboundReply::media(
            group_id,
            text,
            MediaAttachment {
                url,
                duration: req.duration,
            },
        ),
        (Some(text), None) => OutboundReply::text(group_id, text),
        (None, None) => return Err(WebhookError::MissingField("message or media_url")),
    };

    deliver(&state, reply).await
}

fn group_id(raw: &str) -> Result<GroupId, WebhookError> {
    GroupId::new(raw).map_err(|_| WebhookError::MissingField("group_id"))
}

async fn deliver<S: ReplySink>(
    state: &WebhookState<S>,
    reply: OutboundReply,
) -> Result<SendResponse, WebhookError> {
    let group_id = reply.group_id.clone();
    state
        .sink
        .send_reply(reply)
        .await
        .map_err(WebhookError::Delivery)?;
    tracing::info!(%group_id, "webhook notification delivered");
    Ok(SendResponse::Sent)
}
