//! Timeout enforcement.
//!
//! Every call the client makes carries a deadline; elapsed deadlines surface
//! as [`CallError::Timeout`], distinct from service errors.

use std::future::Future;
use std::time::Duration;

use crate::net::error::CallError;

/// Deadline for a health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for a single scheduled request attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut`, failing with [`CallError::Timeout`] once `limit` elapses.
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CallError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let result: Result<(), CallError> = with_deadline(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CallError::Timeout(d)) if d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: Result<(), CallError> =
            with_deadline(REQUEST_TIMEOUT, async { Err(CallError::NotConnected) }).await;
        assert!(matches!(result, Err(CallError::NotConnected)));
    }
}
