//! # hassbridge-adapter-onebot
//!
//! Chat transport speaking OneBot v11 to NapCat over a websocket.
//!
//! ## Responsibilities
//! - Keep a websocket to the OneBot implementation up, reconnecting with backoff
//! - Turn group message events into [`InboundMessage`](hassbridge_domain::message::InboundMessage)s,
//!   stripping mentions and honouring `require_mention`
//! - Fetch voice records with `get_record` when a message carries no text
//! - Implement [`ReplySink`](hassbridge_app::ports::ReplySink) with `send_group_msg`,
//!   threading replies to the message they answer
//!
//! ## Dependency rule
//! Depends on `domain` and `app` (for the port trait). Nothing depends on
//! this crate except the binary.

mod action;
mod client;
pub mod config;
pub mod error;
mod event;

pub use client::{OneBotClient, spawn};
pub use config::OneBotConfig;
pub use error::OneBotError;
