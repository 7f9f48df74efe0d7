//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests, outcomes, cumulative latency and reconnects
//! - Mirror circuit breaker state
//! - Produce consistent snapshots with derived rates
//! - Expose Prometheus-compatible metrics when enabled
//!
//! # Metrics
//! - `rpc_client_requests_total` (counter): attempts by `outcome` (success/failure)
//! - `rpc_client_request_duration_seconds` (histogram): per-attempt latency
//! - `rpc_client_reconnects_total` (counter): successful reconnects
//! - `rpc_client_reconnect_exhausted_total` (counter): reconnect sequences that gave up
//! - `rpc_client_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - In-process counters sit behind one lock so a snapshot is a single
//!   consistent read
//! - Every update is also forwarded to the `metrics` facade; without an
//!   installed recorder those calls are no-ops

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::resilience::circuit_breaker::CircuitState;

/// Initialize the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

#[derive(Debug)]
struct Counters {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_duration: Duration,
    reconnect_count: u64,
    last_request: Option<DateTime<Utc>>,
    circuit_state: CircuitState,
}

/// Point-in-time view of the client's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percentage in `[0, 100]`; `0.0` before any request.
    pub success_rate: f64,
    pub average_request_duration_ms: f64,
    pub reconnect_count: u64,
    pub circuit_breaker_state: String,
    pub last_request_timestamp: Option<DateTime<Utc>>,
}

/// Thread-safe request and connection counters.
#[derive(Debug)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters {
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
                total_duration: Duration::ZERO,
                reconnect_count: 0,
                last_request: None,
                circuit_state: CircuitState::Closed,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one request attempt and how long it took.
    pub fn record_request(&self, success: bool, duration: Duration) {
        {
            let mut counters = self.lock();
            counters.total_requests += 1;
            if success {
                counters.successful_requests += 1;
            } else {
                counters.failed_requests += 1;
            }
            counters.total_duration += duration;
            counters.last_request = Some(Utc::now());
        }

        let outcome = if success { "success" } else { "failure" };
        counter!("rpc_client_requests_total", "outcome" => outcome).increment(1);
        histogram!("rpc_client_request_duration_seconds").record(duration.as_secs_f64());
    }

    pub fn record_reconnect(&self) {
        self.lock().reconnect_count += 1;
        counter!("rpc_client_reconnects_total").increment(1);
    }

    /// Count a reconnect sequence that ran out of attempts.
    pub fn record_reconnect_exhausted(&self) {
        counter!("rpc_client_reconnect_exhausted_total").increment(1);
    }

    pub fn update_circuit_state(&self, state: CircuitState) {
        self.lock().circuit_state = state;
        gauge!("rpc_client_circuit_state").set(state.as_gauge());
    }

    /// Transition callback that mirrors breaker state into these metrics.
    pub fn circuit_observer(self: &Arc<Self>) -> impl Fn(CircuitState) + Send + Sync + 'static {
        let metrics = Arc::clone(self);
        move |state| metrics.update_circuit_state(state)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.lock();
        let (success_rate, average_ms) = if counters.total_requests == 0 {
            (0.0, 0.0)
        } else {
            let total = counters.total_requests as f64;
            (
                counters.successful_requests as f64 / total * 100.0,
                counters.total_duration.as_secs_f64() * 1000.0 / total,
            )
        };

        MetricsSnapshot {
            total_requests: counters.total_requests,
            successful_requests: counters.successful_requests,
            failed_requests: counters.failed_requests,
            success_rate,
            average_request_duration_ms: average_ms,
            reconnect_count: counters.reconnect_count,
            circuit_breaker_state: counters.circuit_state.to_string(),
            last_request_timestamp: counters.last_request,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Log a snapshot every `interval` until `shutdown` is cancelled.
pub async fn run_reporter(
    metrics: Arc<MetricsCollector>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("Metrics reporter stopping");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = metrics.snapshot();
                tracing::info!(
                    total_requests = snapshot.total_requests,
                    successful_requests = snapshot.successful_requests,
                    failed_requests = snapshot.failed_requests,
                    success_rate = snapshot.success_rate,
                    average_request_duration_ms = snapshot.average_request_duration_ms,
                    reconnect_count = snapshot.reconnect_count,
                    circuit_breaker_state = %snapshot.circuit_breaker_state,
                    "Metrics report"
                );
            }
        }
    }
}
