//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → TOML file (optional, --config)
//!     → environment variables (GRPC_SERVER_ADDR, REQUEST_INTERVAL_SEC, ...)
//!     → command-line overrides
//!     → validation.rs (clamp, semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, EnvWarning, LoadedConfig};
pub use schema::ClientConfig;
pub use validation::ValidationError;
