//! # hassbridge-app
//!
//! Application layer — services and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationPlatform` — list entities, call actions, run scripts, read context
//!   - `ConversationAgent` — forward natural language, keep a session id
//!   - `Transcriber` — turn a voice clip into text
//!   - `ReplySink` — deliver one reply to a chat group
//! - Provide the services that work on a **directory generation**:
//!   - `DirectoryCache` — atomically swapped entity snapshot
//!   - `Resolver` — id, friendly name, alias and substring matching
//!   - `CommandExecutor` — per-target platform calls
//!   - `PermissionGate` — sender and group allow-lists
//! - Drive a message to its terminal state (`DispatchRouter`) and serialize
//!   messages per group (`Sequencer`)
//!
//! ## Dependency rule
//! Depends on `hassbridge-domain` only (plus `tokio` for channels, tasks and timeouts).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod deadline;
pub mod dispatcher;
pub mod ports;
pub mod reply;
pub mod sequencer;
pub mod services;
