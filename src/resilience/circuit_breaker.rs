//! Circuit breaker guarding the scheduled call path.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed down, requests are skipped
//! - Half-Open: a bounded number of trial requests test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: open_duration elapsed (checked in allow_request)
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! All counters live behind one mutex and reset on every transition, so the
//! Open → Half-Open check and the admission decision are a single critical
//! section. Half-Open admission reserves a trial slot that is handed back
//! when the attempt is recorded (or via [`CircuitBreaker::release_trial`]),
//! so overlapping callers never exceed `half_open_max_calls`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Numeric encoding exported as a gauge.
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before opening.
    pub failure_threshold: u32,
    /// Successes in Half-Open before closing.
    pub success_threshold: u32,
    /// Time spent Open before trial requests are admitted.
    pub open_duration: Duration,
    /// Trial requests admitted while Half-Open.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_duration: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    #[must_use]
    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls;
        self
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    /// Admitted Half-Open trials not yet recorded.
    trials_in_flight: u32,
    last_state_change: Instant,
}

impl Inner {
    fn transition(&mut self, to: CircuitState, now: Instant) {
        let from = self.state;
        self.state = to;
        self.failure_count = 0;
        self.success_count = 0;
        self.half_open_calls = 0;
        self.trials_in_flight = 0;
        self.last_state_change = now;

        match to {
            CircuitState::Open => warn!(from = %from, to = %to, "Circuit breaker opened"),
            CircuitState::HalfOpen => info!(from = %from, to = %to, "Circuit breaker half-open"),
            CircuitState::Closed => info!(from = %from, to = %to, "Circuit breaker closed"),
        }
    }

    fn settle_trial(&mut self) {
        self.trials_in_flight = self.trials_in_flight.saturating_sub(1);
        self.half_open_calls += 1;
    }
}

/// Callback invoked with the new state on every transition.
pub type TransitionObserver = Arc<dyn Fn(CircuitState) + Send + Sync>;

/// Failure/recovery state machine.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    observer: Option<TransitionObserver>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("inner", &self.inner)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                trials_in_flight: 0,
                last_state_change: Instant::now(),
            }),
            observer: None,
        }
    }

    /// Run `observer` inside the critical section of every transition, so
    /// observed states arrive in order.
    #[must_use]
    pub fn on_transition<F>(mut self, observer: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        inner.transition(to, now);
        if let Some(observer) = &self.observer {
            observer(to);
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.lock().success_count
    }

    pub fn half_open_calls(&self) -> u32 {
        self.lock().half_open_calls
    }

    pub fn trials_in_flight(&self) -> u32 {
        self.lock().trials_in_flight
    }

    /// Whether a request may be issued now. In Half-Open a `true` reserves
    /// one trial slot; callers that end up not issuing the request must
    /// call [`CircuitBreaker::release_trial`].
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    pub(crate) fn allow_request_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if now.saturating_duration_since(inner.last_state_change) >= self.config.open_duration {
                    self.transition(&mut inner, CircuitState::HalfOpen, now);
                    inner.trials_in_flight = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls + inner.trials_in_flight < self.config.half_open_max_calls {
                    inner.trials_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Hand back a Half-Open trial slot that was admitted but never used.
    pub fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    pub fn record_success(&self) {
        self.record_success_at(Instant::now());
    }

    pub(crate) fn record_success_at(&self, now: Instant) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.settle_trial();
                inner.success_count += 1;
                debug!(
                    successes = inner.success_count,
                    threshold = self.config.success_threshold,
                    "Circuit breaker success in half-open state"
                );
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.success_count = 0;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                inner.settle_trial();
                self.transition(&mut inner, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed, Instant::now());
        } else {
            inner.failure_count = 0;
            inner.success_count = 0;
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
