//! Jittered periodic request driver.
//!
//! # Data Flow
//! ```text
//! jittered sleep (jitter.rs)
//!     → circuit breaker admits?
//!     → connection Connected? (Degraded: spawn reconnect, skip)
//!     → limiter slot free?
//!     → spawn tracked retry sequence holding the slot
//! ```
//!
//! A cycle never waits on the request it dispatches; slow sequences only
//! consume limiter slots. A cycle admitted by a half-open breaker that then
//! skips hands its trial slot back.

pub mod jitter;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::net::connection::{ConnectionManager, ConnectionState};
use crate::net::error::CallError;
use crate::net::request_id::RequestIdGenerator;
use crate::net::transport::HelloCall;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::concurrency::ConcurrencyLimiter;
use crate::resilience::retries::RetryExecutor;
use crate::resilience::timeouts::{with_deadline, REQUEST_TIMEOUT};

pub use jitter::jittered_interval;

/// Operation name used in logs and spans.
const OPERATION: &str = "SayHello";

/// What a single scheduler wake-up did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    ShuttingDown,
    /// The circuit breaker refused the request.
    CircuitOpen,
    NotConnected(ConnectionState),
    /// Connection degraded; a reconnect was spawned instead.
    Recovering,
    /// Every limiter slot is held by an in-flight sequence.
    Saturated,
    Dispatched { request_id: Option<String> },
}

/// Timing settings for the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub interval: Duration,
    pub jitter_percent: u32,
    /// Deadline for each attempt.
    pub request_timeout: Duration,
}

impl ScheduleSettings {
    pub fn new(interval: Duration, jitter_percent: u32) -> Self {
        Self {
            interval,
            jitter_percent,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Drives periodic requests through the resilience stack.
pub struct RequestScheduler {
    settings: ScheduleSettings,
    breaker: Arc<CircuitBreaker>,
    connection: Arc<ConnectionManager>,
    executor: RetryExecutor,
    limiter: ConcurrencyLimiter,
    request_ids: Option<Arc<dyn RequestIdGenerator>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl RequestScheduler {
    pub fn new(
        settings: ScheduleSettings,
        breaker: Arc<CircuitBreaker>,
        connection: Arc<ConnectionManager>,
        executor: RetryExecutor,
        limiter: ConcurrencyLimiter,
        tracker: TaskTracker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            breaker,
            connection,
            executor,
            limiter,
            request_ids: None,
            tracker,
            shutdown,
        }
    }

    /// Attach a generator; each dispatched request then carries an id.
    #[must_use]
    pub fn with_request_ids(mut self, generator: Arc<dyn RequestIdGenerator>) -> Self {
        self.request_ids = Some(generator);
        self
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            jitter_percent = self.settings.jitter_percent,
            max_concurrent = self.limiter.capacity(),
            "Request scheduler starting"
        );

        loop {
            let wait = jittered_interval(
                self.settings.interval,
                self.settings.jitter_percent,
                &mut rand::thread_rng(),
            );

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Request scheduler received shutdown signal, exiting loop");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let outcome = self.cycle();
                    tracing::debug!(outcome = ?outcome, "Scheduler cycle finished");
                }
            }
        }
    }

    /// Run one scheduling decision.
    pub fn cycle(&self) -> CycleOutcome {
        if self.shutdown.is_cancelled() {
            return CycleOutcome::ShuttingDown;
        }

        if !self.breaker.allow_request() {
            tracing::info!(circuit_state = %self.breaker.state(), "Circuit breaker refusing, skipping request");
            return CycleOutcome::CircuitOpen;
        }

        match self.connection.state() {
            state @ (ConnectionState::Disconnected | ConnectionState::Connecting) => {
                self.breaker.release_trial();
                tracing::info!(state = %state, "Not connected, skipping request");
                return CycleOutcome::NotConnected(state);
            }
            ConnectionState::Degraded => {
                self.breaker.release_trial();
                tracing::info!("Connection degraded, recovering before next request");
                let connection = self.connection.clone();
                self.tracker.spawn(async move {
                    connection.reconnect().await;
                });
                return CycleOutcome::Recovering;
            }
            ConnectionState::Connected => {}
        }

        let Some(permit) = self.limiter.acquire() else {
            self.breaker.release_trial();
            tracing::warn!(
                max_concurrent = self.limiter.capacity(),
                "Concurrency limit reached, skipping request"
            );
            return CycleOutcome::Saturated;
        };

        let request_id = self.request_ids.as_ref().map(|g| g.generate());
        let name = request_name();
        let span = tracing::info_span!(
            "request",
            request_id = request_id.as_deref().unwrap_or("-"),
            name = %name
        );

        let connection = self.connection.clone();
        let executor = self.executor.clone();
        let timeout = self.settings.request_timeout;
        let call_id = request_id.clone();

        self.tracker.spawn(
            async move {
                let _permit = permit;
                executor
                    .execute(OPERATION, || {
                        let connection = connection.clone();
                        let call = HelloCall::new(name.clone(), timeout).with_request_id(call_id.clone());
                        async move {
                            let channel = connection.channel().ok_or(CallError::NotConnected)?;
                            let reply = with_deadline(timeout, channel.say_hello(call)).await?;
                            tracing::debug!(reply = %reply, "Reply received");
                            Ok::<_, CallError>(reply)
                        }
                    })
                    .await;
            }
            .instrument(span),
        );

        CycleOutcome::Dispatched { request_id }
    }
}

fn request_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("client-{secs}")
}
