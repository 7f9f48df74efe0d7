//! Client facade.
//!
//! Composes the connection manager, health checker, circuit breaker, retry
//! executor, limiter, scheduler and metrics into one long-running client.
//! Construction fails fast when the first connect fails; once built, the
//! client heals itself until [`Client::shutdown`] is called.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::loader::{finalize, ConfigError};
use crate::config::schema::ClientConfig;
use crate::health::active::HealthChecker;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::compression::Codec;
use crate::net::connection::{ConnectionManager, ConnectionState};
use crate::net::error::ConnectError;
use crate::net::transport::{DialTarget, TonicTransport, Transport};
use crate::observability::metrics::{run_reporter, MetricsCollector, MetricsSnapshot};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::concurrency::ConcurrencyLimiter;
use crate::resilience::retries::RetryExecutor;
use crate::scheduler::{RequestScheduler, ScheduleSettings};

/// Errors that prevent a client from being constructed.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("initial connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: ConnectError,
    },
}

/// A running resilient client.
pub struct Client {
    config: Arc<ClientConfig>,
    shutdown: Shutdown,
    token: CancellationToken,
    connection: Arc<ConnectionManager>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<MetricsCollector>,
}

impl Client {
    /// Connect over gRPC and start the background loops.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_transport(config, Arc::new(TonicTransport)).await
    }

    /// Like [`Client::connect`] with a caller-supplied transport.
    pub async fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let config = Arc::new(finalize(config)?);
        let shutdown = Shutdown::new();
        let token = shutdown.token();

        let metrics = Arc::new(MetricsCollector::new());
        let breaker = Arc::new(
            CircuitBreaker::new(config.circuit_breaker.to_breaker_config())
                .on_transition(metrics.circuit_observer()),
        );
        metrics.update_circuit_state(breaker.state());

        let connection = Arc::new(ConnectionManager::new(
            dial_target(&config),
            transport,
            metrics.clone(),
            token.clone(),
        ));

        if let Err(source) = connection.connect().await {
            shutdown.begin();
            connection.close();
            shutdown.complete();
            tracing::error!(address = %config.server.address, error = %source, "Initial connection failed");
            return Err(ClientError::Connect {
                address: config.server.address.clone(),
                source,
            });
        }

        let client = Self {
            config,
            shutdown,
            token,
            connection,
            breaker,
            metrics,
        };
        client.spawn_loops();

        tracing::info!(
            address = %client.config.server.address,
            interval_secs = client.config.requests.interval_secs,
            keep_alive_secs = client.config.health_check.keep_alive_secs,
            "Client started"
        );
        Ok(client)
    }

    fn spawn_loops(&self) {
        let health = HealthChecker::new(self.connection.clone(), self.config.health_check.keep_alive());
        self.shutdown.spawn(health.run(self.token.clone()));

        let requests = &self.config.requests;
        let executor = RetryExecutor::new(
            requests.max_retries,
            self.breaker.clone(),
            self.metrics.clone(),
            self.token.clone(),
        );
        let mut scheduler = RequestScheduler::new(
            ScheduleSettings::new(requests.interval(), requests.jitter_percent),
            self.breaker.clone(),
            self.connection.clone(),
            executor,
            ConcurrencyLimiter::new(requests.max_concurrent),
            self.shutdown.tracker(),
            self.token.clone(),
        );
        if requests.generate_request_id {
            scheduler = scheduler.with_request_ids(Arc::from(requests.request_id_format.build()));
        }
        self.shutdown.spawn(scheduler.run());

        let report_secs = self.config.observability.report_interval_secs;
        if report_secs > 0 {
            self.shutdown.spawn(run_reporter(
                self.metrics.clone(),
                Duration::from_secs(report_secs),
                self.token.clone(),
            ));
        }
    }

    /// Stop every loop, wait for in-flight work and release the channel.
    ///
    /// Returns `true` for the call that performed the teardown; concurrent
    /// and later calls return `false` immediately.
    pub async fn shutdown(&self) -> bool {
        if !self.shutdown.begin() {
            return false;
        }

        self.shutdown.drain().await;
        self.connection.close();
        self.shutdown.complete();
        true
    }

    /// Wait until a shutdown has fully completed.
    pub async fn closed(&self) {
        self.shutdown.wait_done().await;
    }

    /// Run until `signal` resolves (or another caller shuts down), then tear down.
    pub async fn run_until<F>(&self, signal: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => tracing::info!("Shutdown requested"),
            _ = self.token.cancelled() => {}
        }
        self.shutdown().await;
        self.closed().await;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn reconnect_exhausted_count(&self) -> u64 {
        self.connection.reconnect_exhausted_count()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn dial_target(config: &ClientConfig) -> DialTarget {
    let compression = if config.compression.enabled {
        config.compression.codec.parse::<Codec>().ok()
    } else {
        None
    };

    DialTarget {
        address: config.server.address.clone(),
        compression,
        connect_timeout: config.server.connect_timeout(),
        tcp_keepalive: Some(config.health_check.keep_alive()),
    }
}
