//! Configuration validation.
//!
//! # Responsibilities
//! - Clamp values with a documented range (jitter, concurrency)
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: &ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;
use crate::net::compression::Codec;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Clamp ranged values into bounds.
pub fn normalize(config: &mut ClientConfig) {
    if config.requests.jitter_percent > 100 {
        tracing::warn!(value = config.requests.jitter_percent, "jitter_percent above 100, clamping");
        config.requests.jitter_percent = 100;
    }
    if config.requests.max_concurrent == 0 {
        tracing::warn!("max_concurrent is 0, raising to 1");
        config.requests.max_concurrent = 1;
    }
    config.server.address = config.server.address.trim().to_string();
    config.compression.codec = config.compression.codec.trim().to_ascii_lowercase();
}

/// Validate a normalized configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_address(&config.server.address, &mut errors);

    if config.server.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("server.connect_timeout_secs", "must be greater than 0"));
    }
    if config.requests.interval_secs == 0 {
        errors.push(ValidationError::new("requests.interval_secs", "must be greater than 0"));
    }
    if config.health_check.keep_alive_secs == 0 {
        errors.push(ValidationError::new("health_check.keep_alive_secs", "must be greater than 0"));
    }

    if config.compression.enabled {
        if let Err(e) = config.compression.codec.parse::<Codec>() {
            errors.push(ValidationError::new("compression.codec", e.to_string()));
        }
    }

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be at least 1"));
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be at least 1"));
    }
    if cb.half_open_max_calls == 0 {
        errors.push(ValidationError::new("circuit_breaker.half_open_max_calls", "must be at least 1"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_address(address: &str, errors: &mut Vec<ValidationError>) {
    const FIELD: &str = "server.address";

    if address.is_empty() {
        errors.push(ValidationError::new(FIELD, "must not be empty"));
        return;
    }

    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    match Url::parse(&candidate) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            FIELD,
            format!("unsupported scheme '{}', only plaintext http is supported", url.scheme()),
        )),
        Ok(url) if url.host_str().map_or(true, str::is_empty) => {
            errors.push(ValidationError::new(FIELD, "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(FIELD, format!("'{address}' is invalid: {e}"))),
    }
}
