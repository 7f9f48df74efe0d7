//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionManager::connect / reconnect
//!     → transport.rs (dial, compression, keep-alive)
//!     → GreeterChannel::say_hello (metadata, deadline)
//!     → error.rs (status → transient / fatal)
//!
//! Connection States:
//!     Disconnected → Connecting → Connected ⇄ Degraded
//! ```

pub mod compression;
pub mod connection;
pub mod error;
pub mod proto;
pub mod request_id;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionManager, ConnectionState, ReconnectOutcome};
pub use error::{CallError, ConnectError};
pub use transport::{DialTarget, GreeterChannel, HelloCall, TonicTransport, Transport};
