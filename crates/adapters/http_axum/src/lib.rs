//! # hassbridge-adapter-http-axum
//!
//! Webhook transport built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - `POST /webhook/notify` and `POST /webhook/multimodal`: validate the
//!   shared token and the payload, then deliver through a
//!   [`ReplySink`](hassbridge_app::ports::ReplySink)
//! - `GET /health` for container probes
//! - Map delivery failures into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `hassbridge-app` (for the reply sink port) and
//! `hassbridge-domain` (for outbound reply types). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

pub use router::build;
pub use state::WebhookState;
