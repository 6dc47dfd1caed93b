//! Transcription port — speech to text.

use std::future::Future;
use std::sync::Arc;

use hassbridge_domain::error::BridgeError;
use hassbridge_domain::message::VoiceClip;

/// Audio plus the vendor engine/region to recognise it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    pub clip: VoiceClip,
    pub engine: String,
    pub region: String,
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    Text(String),
    /// The vendor recognised nothing.
    NoResult,
}

impl Transcript {
    /// Non-blank recognised text.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Self::Text(_) | Self::NoResult => None,
        }
    }
}

pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> impl Future<Output = Result<Transcript, BridgeError>> + Send;
}

impl<T: Transcriber> Transcriber for Arc<T> {
    fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> impl Future<Output = Result<Transcript, BridgeError>> + Send {
        (**self).transcribe(request)
    }
}
