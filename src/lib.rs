//! Resilient long-running RPC client library.

pub mod client;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod scheduler;

pub use client::{Client, ClientError};
pub use config::schema::ClientConfig;
pub use lifecycle::Shutdown;
pub use net::{ConnectionState, Transport};
pub use observability::MetricsSnapshot;
pub use resilience::CircuitState;
