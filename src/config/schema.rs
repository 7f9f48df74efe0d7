//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::request_id::RequestIdFormat;
use crate::resilience::circuit_breaker::CircuitBreakerConfig;

/// Root configuration for the client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote server settings.
    pub server: ServerConfig,

    /// Scheduled request settings.
    pub requests: RequestConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Wire compression.
    pub compression: CompressionConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Remote server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server address (e.g., "localhost:50051" or "http://10.0.0.1:50051").
    pub address: String,

    /// Dial timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:50051".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Scheduled request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Base interval between scheduled requests in seconds.
    pub interval_secs: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Jitter applied to the interval, 0 to 100 percent.
    pub jitter_percent: u32,

    /// Retry sequences allowed in flight at once.
    pub max_concurrent: usize,

    /// Attach an `x-request-id` to every request.
    pub generate_request_id: bool,

    pub request_id_format: RequestIdFormat,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_retries: 3,
            jitter_percent: 10,
            max_concurrent: 5,
            generate_request_id: true,
            request_id_format: RequestIdFormat::Uuid,
        }
    }
}

impl RequestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Interval between health ticks in seconds.
    pub keep_alive_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self { keep_alive_secs: 20 }
    }
}

impl HealthCheckConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,

    /// Codec name ("gzip" or "zstd"). `snappy` is not available over tonic
    /// and fails validation when compression is enabled.
    pub codec: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            codec: "gzip".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_duration_secs: u64,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_duration_secs: 30,
            half_open_max_calls: 3,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_success_threshold(self.success_threshold)
            .with_open_duration(Duration::from_secs(self.open_duration_secs))
            .with_half_open_max_calls(self.half_open_max_calls)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Interval between logged metrics reports in seconds; 0 disables.
    pub report_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            report_interval_secs: 60,
        }
    }
}
