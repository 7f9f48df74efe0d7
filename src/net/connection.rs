//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Own the transport channel and its state (Disconnected → Connecting → Connected)
//! - Re-establish the channel with bounded, cancellable backoff
//! - Tag every established channel with a unique connection ID for tracing
//! - Release the channel exactly once on teardown
//!
//! # Locking
//! State, channel and last error live behind one `std::sync::Mutex` that is
//! never held across a dial or a call. Reconnects are single-flight through a
//! separate async gate acquired with `try_lock`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::net::error::ConnectError;
use crate::net::transport::{DialTarget, GreeterChannel, Transport};
use crate::observability::metrics::MetricsCollector;
use crate::resilience::backoff::reconnect_backoff;

/// Attempts made by one reconnect sequence before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an established channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of the client's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Usable but suspect; the next health tick reconnects.
    Degraded,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Degraded => "DEGRADED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a [`ConnectionManager::reconnect`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Shutdown observed before or during the sequence.
    ShuttingDown,
    /// Another reconnect already owns the gate.
    AlreadyInFlight,
    Reconnected { attempts: u32 },
    Exhausted,
}

struct Inner {
    state: ConnectionState,
    channel: Option<Arc<dyn GreeterChannel>>,
    connection_id: Option<ConnectionId>,
    last_error: Option<String>,
}

/// Owns the transport channel and its state machine.
pub struct ConnectionManager {
    target: DialTarget,
    transport: Arc<dyn Transport>,
    inner: Mutex<Inner>,
    reconnect_gate: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    metrics: Arc<MetricsCollector>,
    exhausted: AtomicU64,
}

impl ConnectionManager {
    pub fn new(
        target: DialTarget,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsCollector>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            target,
            transport,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                channel: None,
                connection_id: None,
                last_error: None,
            }),
            reconnect_gate: tokio::sync::Mutex::new(()),
            shutdown,
            metrics,
            exhausted: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.lock().connection_id
    }

    /// Channel handle, present only while `Connected` or `Degraded`.
    pub fn channel(&self) -> Option<Arc<dyn GreeterChannel>> {
        let inner = self.lock();
        match inner.state {
            ConnectionState::Connected | ConnectionState::Degraded => inner.channel.clone(),
            _ => None,
        }
    }

    /// Number of reconnect sequences that ran out of attempts.
    pub fn reconnect_exhausted_count(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }

    /// Dial the server once.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        if self.shutdown.is_cancelled() {
            return Err(ConnectError::ShuttingDown);
        }

        self.lock().state = ConnectionState::Connecting;
        tracing::info!(
            address = %self.target.address,
            compression = self.target.compression.map(|c| c.name()).unwrap_or("none"),
            "Connecting to server"
        );

        match self.transport.dial(&self.target).await {
            Ok(channel) => {
                let id = ConnectionId::new();
                {
                    let mut inner = self.lock();
                    inner.state = ConnectionState::Connected;
                    inner.channel = Some(channel);
                    inner.connection_id = Some(id);
                    inner.last_error = None;
                }
                tracing::info!(address = %self.target.address, connection_id = %id, "Connected");
                Ok(())
            }
            Err(e) => {
                {
                    let mut inner = self.lock();
                    inner.state = ConnectionState::Disconnected;
                    inner.channel = None;
                    inner.connection_id = None;
                    inner.last_error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Drop the current channel and dial again with bounded backoff.
    ///
    /// Single-flight: a call made while another sequence runs returns
    /// [`ReconnectOutcome::AlreadyInFlight`] without waiting.
    pub async fn reconnect(&self) -> ReconnectOutcome {
        if self.shutdown.is_cancelled() {
            return ReconnectOutcome::ShuttingDown;
        }

        let Ok(_gate) = self.reconnect_gate.try_lock() else {
            tracing::debug!("Reconnect already in flight");
            return ReconnectOutcome::AlreadyInFlight;
        };

        let previous = {
            let mut inner = self.lock();
            inner.state = ConnectionState::Connecting;
            inner.connection_id = None;
            inner.channel.take()
        };
        drop(previous);

        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            if self.shutdown.is_cancelled() {
                return ReconnectOutcome::ShuttingDown;
            }

            tracing::info!(
                attempt = attempt + 1,
                max_attempts = MAX_RECONNECT_ATTEMPTS,
                "Reconnect attempt"
            );

            match self.connect().await {
                Ok(()) => {
                    self.metrics.record_reconnect();
                    tracing::info!(attempts = attempt + 1, "Reconnected");
                    return ReconnectOutcome::Reconnected {
                        attempts: attempt + 1,
                    };
                }
                Err(ConnectError::ShuttingDown) => return ReconnectOutcome::ShuttingDown,
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
                }
            }

            if attempt + 1 == MAX_RECONNECT_ATTEMPTS {
                break;
            }

            let delay = reconnect_backoff(attempt);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off before next reconnect");
            tokio::select! {
                _ = self.shutdown.cancelled() => return ReconnectOutcome::ShuttingDown,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let error = ConnectError::Exhausted(MAX_RECONNECT_ATTEMPTS);
        {
            let mut inner = self.lock();
            inner.state = ConnectionState::Disconnected;
            inner.last_error = Some(error.to_string());
        }
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_reconnect_exhausted();
        tracing::error!(
            address = %self.target.address,
            max_attempts = MAX_RECONNECT_ATTEMPTS,
            "Reconnect exhausted"
        );
        ReconnectOutcome::Exhausted
    }

    /// Mark the channel unusable; the next health tick reconnects.
    pub fn mark_disconnected(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.lock();
        inner.state = ConnectionState::Disconnected;
        inner.last_error = Some(reason);
    }

    /// Mark the channel suspect without dropping it.
    pub fn mark_degraded(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.lock();
        if inner.state == ConnectionState::Connected {
            inner.state = ConnectionState::Degraded;
            inner.last_error = Some(reason);
        }
    }

    /// Release the channel. Returns `true` only for the call that released it.
    pub fn close(&self) -> bool {
        let released = {
            let mut inner = self.lock();
            inner.state = ConnectionState::Disconnected;
            inner.connection_id = None;
            inner.channel.take()
        };

        match released {
            Some(channel) => {
                drop(channel);
                tracing::info!(address = %self.target.address, "Connection closed");
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConnectionManager")
            .field("address", &self.target.address)
            .field("state", &inner.state)
            .field("connection_id", &inner.connection_id)
            .field("last_error", &inner.last_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::ScriptedTransport;
    use std::time::Duration;

    fn target() -> DialTarget {
        DialTarget {
            address: "localhost:50051".into(),
            compression: None,
            connect_timeout: Duration::from_secs(5),
            tcp_keepalive: None,
        }
    }

    fn manager(transport: Arc<ScriptedTransport>) -> (Arc<ConnectionManager>, Arc<MetricsCollector>, CancellationToken) {
        let metrics = Arc::new(MetricsCollector::new());
        let token = CancellationToken::new();
        let manager = Arc::new(ConnectionManager::new(target(), transport, metrics.clone(), token.clone()));
        (manager, metrics, token)
    }

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn connect_success_sets_connected() {
        let transport = ScriptedTransport::new();
        let (manager, _, _) = manager(transport.clone());

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.channel().is_some());
        assert!(manager.connection_id().is_some());
        assert!(manager.last_error().is_none());
    }

    #[tokio::test]
    async fn connect_failure_records_error() {
        let transport = ScriptedTransport::new();
        transport.refuse_dials(true);
        let (manager, _, _) = manager(transport);

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.last_error().unwrap().contains("refused"));
        assert!(manager.channel().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_succeeds_after_failures() {
        let transport = ScriptedTransport::new();
        transport.script_dials(&[false, false, true]);
        let (manager, metrics, _) = manager(transport.clone());

        let outcome = manager.reconnect().await;
        assert_eq!(outcome, ReconnectOutcome::Reconnected { attempts: 3 });
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(metrics.snapshot().reconnect_count, 1);
        assert_eq!(transport.dial_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_exhaustion_is_counted_once() {
        let transport = ScriptedTransport::new();
        transport.refuse_dials(true);
        let (manager, metrics, _) = manager(transport.clone());

        let started = tokio::time::Instant::now();
        let outcome = manager.reconnect().await;

        assert_eq!(outcome, ReconnectOutcome::Exhausted);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_exhausted_count(), 1);
        assert_eq!(transport.dial_count(), MAX_RECONNECT_ATTEMPTS);
        assert_eq!(metrics.snapshot().reconnect_count, 0);
        // 1 + 2 + 5 + 10 seconds between five attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(18));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_is_single_flight() {
        let transport = ScriptedTransport::new();
        transport.refuse_dials(true);
        let (manager, _, _) = manager(transport);

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.reconnect().await }
        });
        tokio::task::yield_now().await;

        assert_eq!(manager.reconnect().await, ReconnectOutcome::AlreadyInFlight);
        assert_eq!(first.await.unwrap(), ReconnectOutcome::Exhausted);
        assert_eq!(manager.reconnect_exhausted_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_backoff() {
        let transport = ScriptedTransport::new();
        transport.refuse_dials(true);
        let (manager, _, token) = manager(transport.clone());

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.reconnect().await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();

        assert_eq!(task.await.unwrap(), ReconnectOutcome::ShuttingDown);
        assert_eq!(transport.dial_count(), 1);
        assert_eq!(manager.reconnect_exhausted_count(), 0);
    }

    #[tokio::test]
    async fn reconnect_is_noop_when_shutting_down() {
        let transport = ScriptedTransport::new();
        let (manager, _, token) = manager(transport.clone());
        token.cancel();

        assert_eq!(manager.reconnect().await, ReconnectOutcome::ShuttingDown);
        assert_eq!(transport.dial_count(), 0);
    }

    #[tokio::test]
    async fn degraded_keeps_channel() {
        let transport = ScriptedTransport::new();
        let (manager, _, _) = manager(transport);
        manager.connect().await.unwrap();

        manager.mark_degraded("slow responses");
        assert_eq!(manager.state(), ConnectionState::Degraded);
        assert!(manager.channel().is_some());

        manager.mark_disconnected("probe failed");
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.channel().is_none());
        assert_eq!(manager.last_error().as_deref(), Some("probe failed"));
    }

    #[tokio::test]
    async fn close_releases_channel_once() {
        let transport = ScriptedTransport::new();
        let (manager, _, _) = manager(transport.clone());
        manager.connect().await.unwrap();

        assert!(manager.close());
        assert!(!manager.close());
        assert_eq!(transport.released_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
