//! Jittered wait computation.

use std::time::Duration;

use rand::Rng;

/// Shortest wait the scheduler will ever use.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// `base ± (jitter_percent% · base) / 2`, uniform, never below [`MIN_INTERVAL`].
pub fn jittered_interval<R: Rng + ?Sized>(base: Duration, jitter_percent: u32, rng: &mut R) -> Duration {
    let percent = jitter_percent.min(100);
    if percent == 0 {
        return base.max(MIN_INTERVAL);
    }

    let base_secs = base.as_secs_f64();
    let range = base_secs * f64::from(percent) / 100.0;
    let offset = rng.gen::<f64>() * range - range / 2.0;
    let secs = base_secs + offset;

    if secs.is_finite() && secs > MIN_INTERVAL.as_secs_f64() {
        Duration::from_secs_f64(secs)
    } else {
        MIN_INTERVAL
    }
}
