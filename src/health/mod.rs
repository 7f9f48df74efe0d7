//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (keep-alive interval)
//!     → Read connection state
//!     → Connected: probe with a 3s deadline
//!     → Disconnected / Degraded / failed probe: reconnect
//! ```

pub mod active;

pub use active::{HealthChecker, HealthOutcome};
