//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging before anything else logs
//! - Report ignored environment values
//! - Install the metrics exporter when enabled
//! - Construct the client (fails fast on the first connect)

use std::net::SocketAddr;

use crate::client::{Client, ClientError};
use crate::config::loader::LoadedConfig;
use crate::observability::logging::init_logging;
use crate::observability::metrics::init_metrics;

/// Bring the client up in dependency order.
pub async fn bootstrap(loaded: LoadedConfig) -> Result<Client, ClientError> {
    let LoadedConfig { config, warnings } = loaded;

    init_logging(&config.observability.log_level, config.observability.json_logs);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-client starting");

    for warning in &warnings {
        warning.log();
    }

    tracing::info!(
        server_address = %config.server.address,
        interval_secs = config.requests.interval_secs,
        max_retries = config.requests.max_retries,
        jitter_percent = config.requests.jitter_percent,
        max_concurrent = config.requests.max_concurrent,
        keep_alive_secs = config.health_check.keep_alive_secs,
        compression = config.compression.enabled,
        codec = %config.compression.codec,
        generate_request_id = config.requests.generate_request_id,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    Client::connect(config).await
}
