//! Timeouts for collaborator calls.

use std::future::Future;
use std::time::Duration;

use hassbridge_domain::error::{BridgeError, Collaborator, TransportError};

/// Default limit applied to every external call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Await `fut`, converting an elapsed deadline into a timeout transport error.
///
/// # Errors
///
/// Returns the future's own error, or a [`TransportError`] of kind timeout
/// attributed to `collaborator` once `limit` elapses.
pub async fn bounded<T, F>(
    collaborator: Collaborator,
    limit: Duration,
    fut: F,
) -> Result<T, BridgeError>
where
    F: Future<Output = Result<T, BridgeError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%collaborator, timeout_ms = limit.as_millis(), "call timed out");
            Err(TransportError::timeout(collaborator).into())
        }
    }
}
