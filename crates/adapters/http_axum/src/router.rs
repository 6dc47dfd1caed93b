//! Axum router assembly.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use hassbridge_app::ports::ReplySink;

use crate::api::webhook;
use crate::state::WebhookState;

/// Build the top-level axum [`Router`].
///
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<S>(state: WebhookState<S>) -> Router
where
    S: ReplySink + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook/notify", post(webhook::notify::<S>))
        .route("/webhook/multimodal", post(webhook::multimodal::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({"status": "ok"}))
}
