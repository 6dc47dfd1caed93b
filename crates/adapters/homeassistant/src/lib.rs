//! # hassbridge-adapter-homeassistant
//!
//! Home Assistant adapter — the automation platform and the conversation
//! agent, both over the Home Assistant REST API.
//!
//! ## Responsibilities
//! - `GET /api/states` into [`EntityRecord`](hassbridge_domain::entity::EntityRecord)s,
//!   enriched with area names rendered through `POST /api/template`
//! - `POST /api/services/<domain>/<service>` for actions and scripts
//! - `POST /api/conversation/process` for natural language, carrying the
//!   group's `conversation_id`
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hassbridge-app` and `hassbridge-domain`.

mod client;
pub mod config;
pub mod error;
mod wire;

pub use client::HomeAssistant;
pub use config::HomeAssistantConfig;
pub use error::HomeAssistantError;
