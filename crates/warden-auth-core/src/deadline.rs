//! Deadlines for I/O-bound steps

use std::future::Future;
use std::time::Duration;

use crate::AuthError;

/// Run `fut`, failing with [`AuthError::Timeout`] if it exceeds `limit`.
///
/// The inner future is dropped on timeout, which cancels any in-flight
/// query and rolls back an open transaction.
pub async fn with_deadline<T, F>(limit: Duration, step: &'static str, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(step, timeout_ms = limit.as_millis() as u64, "deadline exceeded");
            Err(AuthError::Timeout(step))
        }
    }
}
