//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation up to `max_retries + 1` times
//! - Sleep `min(10s, attempt²·1s)` before each retry
//! - Stop on fatal errors and on shutdown
//! - Report every attempt to the circuit breaker and metrics
//!
//! Breaker state reaches metrics through the breaker's transition observer
//! (see [`MetricsCollector::circuit_observer`]), so concurrent sequences
//! never publish a stale state.
//!
//! Sequences are fire-and-forget: outcomes surface only through logs,
//! metrics and breaker state.

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::net::error::CallError;
use crate::observability::metrics::MetricsCollector;
use crate::resilience::backoff::retry_backoff;
use crate::resilience::circuit_breaker::CircuitBreaker;

/// How a retry sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded { attempts: u32 },
    /// A fatal error ended the sequence early.
    Fatal { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Bounded retry wrapper reporting to the breaker and metrics.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_retries: u32,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<MetricsCollector>,
    shutdown: CancellationToken,
}

impl RetryExecutor {
    pub fn new(
        max_retries: u32,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<MetricsCollector>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            max_retries,
            breaker,
            metrics,
            shutdown,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `op` with retries. `label` names the operation in logs.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempts = 0;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                if self.shutdown.is_cancelled() {
                    return RetryOutcome::Cancelled { attempts };
                }
                let delay = retry_backoff(attempt);
                tracing::debug!(operation = label, attempt, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
                tokio::select! {
                    _ = self.shutdown.cancelled() => return RetryOutcome::Cancelled { attempts },
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if self.shutdown.is_cancelled() {
                return RetryOutcome::Cancelled { attempts };
            }

            attempts += 1;
            let started = Instant::now();
            let result = op().await;
            let elapsed = started.elapsed();

            match result {
                Ok(_) => {
                    self.metrics.record_request(true, elapsed);
                    self.breaker.record_success();
                    tracing::info!(
                        operation = label,
                        attempt = attempts,
                        duration_ms = elapsed.as_millis() as u64,
                        "Request succeeded"
                    );
                    return RetryOutcome::Succeeded { attempts };
                }
                Err(e) => {
                    self.metrics.record_request(false, elapsed);
                    self.breaker.record_failure();

                    if e.is_fatal() {
                        tracing::error!(operation = label, attempt = attempts, error = %e, "Request failed with fatal error");
                        return RetryOutcome::Fatal { attempts };
                    }
                    tracing::warn!(
                        operation = label,
                        attempt = attempts,
                        max_attempts,
                        error = %e,
                        "Request attempt failed"
                    );
                }
            }
        }

        tracing::error!(operation = label, attempts, "Request failed after all retries");
        RetryOutcome::Exhausted { attempts }
    }
}
