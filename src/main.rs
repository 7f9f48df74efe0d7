//! Resilient RPC client (v1)
//!
//! A long-running client that keeps a gRPC channel alive, issues periodic
//! calls and heals itself from connection and service failures.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                         RESILIENT CLIENT                         │
//!   │                                                                  │
//!   │  ┌───────────┐   ┌─────────┐   ┌─────────┐   ┌───────────────┐   │
//!   │  │ scheduler │──▶│ circuit │──▶│ limiter │──▶│ retry executor│───┼──▶ Server
//!   │  │ (jitter)  │   │ breaker │   │         │   │  + timeouts   │   │
//!   │  └───────────┘   └─────────┘   └─────────┘   └───────┬───────┘   │
//!   │                       ▲                              │           │
//!   │                       └──────── outcomes ────────────┤           │
//!   │                                                      ▼           │
//!   │  ┌───────────┐   ┌────────────────────┐        ┌──────────┐      │
//!   │  │  health   │──▶│ connection manager │        │ metrics  │      │
//!   │  │  checker  │   │  (reconnect, close)│        │collector │      │
//!   │  └───────────┘   └────────────────────┘        └──────────┘      │
//!   │                                                                  │
//!   │  lifecycle: config → logging → exporter → connect → loops        │
//!   │             signal → cancel → drain → release channel            │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use resilient_client::config::{load_config, ClientConfig, ConfigError, LoadedConfig};
use resilient_client::lifecycle::signals::wait_for_shutdown_signal;
use resilient_client::lifecycle::startup::bootstrap;

#[derive(Debug, Parser)]
#[command(name = "resilient-client", version, about = "Self-healing periodic gRPC client")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server address, overrides file and environment.
    #[arg(short, long)]
    server: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(server) = &self.server {
            config.server.address = server.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }

    fn load(&self) -> Result<LoadedConfig, ConfigError> {
        load_config(
            self.config.as_deref(),
            |key| std::env::var(key).ok(),
            |config| self.apply(config),
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match cli.load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("resilient-client: configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    let client = match bootstrap(loaded).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start client");
            return ExitCode::FAILURE;
        }
    };

    client.run_until(wait_for_shutdown_signal()).await;

    let snapshot = client.metrics();
    match serde_json::to_string(&snapshot) {
        Ok(json) => tracing::info!(metrics = %json, "Final metrics"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize final metrics"),
    }
    tracing::info!("Client stopped");

    ExitCode::SUCCESS
}
