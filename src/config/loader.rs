//! Configuration loading from disk and the environment.
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment
//! variables, command-line overrides (applied by the caller before
//! [`finalize`]).

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::config::validation::{normalize, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An environment value that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvWarning {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl EnvWarning {
    /// Log this warning; called once the subscriber is installed.
    pub fn log(&self) {
        tracing::warn!(
            key = self.key,
            value = %self.value,
            expected = self.expected,
            "Ignoring invalid environment value, keeping default"
        );
    }
}

/// Parsed configuration plus any environment values that were ignored.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ClientConfig,
    pub warnings: Vec<EnvWarning>,
}

/// Read the TOML file at `path`, or start from defaults when `None`.
pub fn read_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(ClientConfig::default()),
    }
}

/// Overlay recognised environment variables onto `config`.
///
/// Empty values are treated as unset. Values that fail to parse are left
/// out and reported in the returned list.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Vec<EnvWarning>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = EnvReader {
        lookup,
        warnings: Vec::new(),
    };

    if let Some(address) = env.string("GRPC_SERVER_ADDR") {
        config.server.address = address;
    }
    if let Some(secs) = env.parse::<u64>("REQUEST_INTERVAL_SEC", "a non-negative integer") {
        config.requests.interval_secs = secs;
    }
    if let Some(retries) = env.parse::<u32>("MAX_RETRIES", "a non-negative integer") {
        config.requests.max_retries = retries;
    }
    if let Some(secs) = env.parse::<u64>("KEEP_ALIVE_SEC", "a non-negative integer") {
        config.health_check.keep_alive_secs = secs;
    }
    if let Some(jitter) = env.parse::<i64>("JITTER_PERCENT", "an integer") {
        config.requests.jitter_percent = jitter.clamp(0, 100) as u32;
    }
    if let Some(max) = env.parse::<i64>("MAX_CONCURRENT_REQUESTS", "an integer") {
        config.requests.max_concurrent = usize::try_from(max.max(1)).unwrap_or(1);
    }
    if let Some(enabled) = env.boolean("ENABLE_COMPRESSION") {
        config.compression.enabled = enabled;
    }
    if let Some(codec) = env.string("COMPRESSION_TYPE") {
        config.compression.codec = codec;
    }
    if let Some(generate) = env.boolean("GENERATE_REQUEST_ID") {
        config.requests.generate_request_id = generate;
    }

    env.warnings
}

/// Normalize and validate a fully merged configuration.
pub fn finalize(mut config: ClientConfig) -> Result<ClientConfig, ConfigError> {
    normalize(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Merge defaults, the optional TOML file, the environment seen through
/// `lookup` and finally `overrides`, then normalize and validate.
pub fn load_config<L, O>(path: Option<&Path>, lookup: L, overrides: O) -> Result<LoadedConfig, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    O: FnOnce(&mut ClientConfig),
{
    let mut config = read_config(path)?;
    let warnings = apply_env_overrides(&mut config, lookup);
    overrides(&mut config);
    let config = finalize(config)?;
    Ok(LoadedConfig { config, warnings })
}

struct EnvReader<F> {
    lookup: F,
    warnings: Vec<EnvWarning>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&mut self, key: &'static str, expected: &'static str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.warnings.push(EnvWarning {
                    key,
                    value: raw,
                    expected,
                });
                None
            }
        }
    }

    fn boolean(&mut self, key: &'static str) -> Option<bool> {
        let raw = self.string(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => {
                self.warnings.push(EnvWarning {
                    key,
                    value: raw,
                    expected: "true/false, 1/0 or yes/no",
                });
                None
            }
        }
    }
}
