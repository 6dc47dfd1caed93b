//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Every method returns a future and is a genuine suspension point: callers
//! never hold a lock across one and always bound it with a timeout.

pub mod automation_platform;
pub mod conversation;
pub mod reply_sink;
pub mod transcription;

pub use automation_platform::AutomationPlatform;
pub use conversation::{ConversationAgent, ConversationReply, ConversationRequest};
pub use reply_sink::ReplySink;
pub use transcription::{Transcriber, Transcript, TranscriptionRequest};
