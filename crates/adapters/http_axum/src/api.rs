//! JSON webhook handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod webhook;
