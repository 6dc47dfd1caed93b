//! # hassbridge-adapter-tencent-asr
//!
//! Speech-to-text through Tencent Cloud's `SentenceRecognition` API.
//!
//! Implements the [`Transcriber`](hassbridge_app::ports::Transcriber) port.
//! Requests are signed with TC3-HMAC-SHA256; an empty `Result` is reported
//! as [`Transcript::NoResult`](hassbridge_app::ports::Transcript::NoResult).

mod client;
pub mod config;
pub mod error;
mod sign;

pub use client::TencentAsr;
pub use config::TencentAsrConfig;
pub use error::AsrError;
