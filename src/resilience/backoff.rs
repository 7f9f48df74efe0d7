//! Quadratic backoff schedules.

use std::time::Duration;

/// Upper bound for the delay between call retries.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Upper bound for the delay between reconnect attempts.
pub const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retry `attempt` (1-based): `min(10s, attempt²·1s)`.
pub fn retry_backoff(attempt: u32) -> Duration {
    quadratic_backoff(attempt, 0, MAX_RETRY_BACKOFF)
}

/// Delay after failed reconnect attempt `n` (0-based): `min(30s, (n²+1)·1s)`.
pub fn reconnect_backoff(n: u32) -> Duration {
    quadratic_backoff(n, 1, MAX_RECONNECT_BACKOFF)
}

fn quadratic_backoff(n: u32, offset_secs: u64, max: Duration) -> Duration {
    let n = u64::from(n);
    let secs = n.saturating_mul(n).saturating_add(offset_secs);
    Duration::from_secs(secs).min(max)
}
