//! Active health checking.
//!
//! # Responsibilities
//! - Periodically inspect the connection state
//! - Probe a connected channel with a short-deadline call
//! - Trigger reconnects for disconnected, degraded or failing channels

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::net::connection::{ConnectionManager, ConnectionState, ReconnectOutcome};
use crate::net::transport::HelloCall;
use crate::resilience::timeouts::{with_deadline, PROBE_TIMEOUT};

/// Name sent with probe calls.
pub const PROBE_NAME: &str = "health-check";

/// What a single health tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    /// Shutdown in progress; nothing checked.
    Skipped,
    /// A connect is already underway.
    Connecting,
    Healthy,
    /// The probe failed and a reconnect ran.
    ProbeFailed { reconnect: ReconnectOutcome },
    /// The state called for a reconnect without probing.
    Reconnected {
        from: ConnectionState,
        reconnect: ReconnectOutcome,
    },
}

/// Periodic prober driving connection recovery.
pub struct HealthChecker {
    connection: Arc<ConnectionManager>,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(connection: Arc<ConnectionManager>, interval: Duration) -> Self {
        Self {
            connection,
            interval,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            probe_timeout_secs = self.probe_timeout.as_secs(),
            "Health checker starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial connect just ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.check(&shutdown).await;
                    tracing::debug!(outcome = ?outcome, "Health tick finished");
                }
            }
        }
    }

    /// Run one health tick.
    pub async fn check(&self, shutdown: &CancellationToken) -> HealthOutcome {
        if shutdown.is_cancelled() {
            return HealthOutcome::Skipped;
        }

        let state = self.connection.state();
        match state {
            ConnectionState::Connecting => {
                tracing::debug!("Connection in progress, skipping health check");
                HealthOutcome::Connecting
            }
            ConnectionState::Disconnected | ConnectionState::Degraded => {
                tracing::info!(state = %state, "Connection not healthy, reconnecting");
                let reconnect = self.connection.reconnect().await;
                HealthOutcome::Reconnected {
                    from: state,
                    reconnect,
                }
            }
            ConnectionState::Connected => match self.probe().await {
                Ok(()) => {
                    tracing::debug!("Health check passed");
                    HealthOutcome::Healthy
                }
                Err(reason) => {
                    tracing::error!(error = %reason, "Health check failed, connection may be lost");
                    self.connection.mark_disconnected(reason);
                    let reconnect = self.connection.reconnect().await;
                    HealthOutcome::ProbeFailed { reconnect }
                }
            },
        }
    }

    async fn probe(&self) -> Result<(), String> {
        let Some(channel) = self.connection.channel() else {
            return Err("no channel while connected".to_string());
        };

        let call = HelloCall::new(PROBE_NAME, self.probe_timeout);
        with_deadline(self.probe_timeout, channel.say_hello(call))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
