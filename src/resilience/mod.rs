//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduled request:
//!     → circuit_breaker.rs (admit or skip)
//!     → concurrency.rs (take a slot for the whole sequence)
//!     → retries.rs (bounded attempts, backoff.rs delays)
//!     → timeouts.rs (per-attempt deadline)
//!     → outcome fed back to circuit_breaker.rs and metrics
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Fatal errors are never retried
//! - All waits are cancellable by shutdown

pub mod backoff;
pub mod circuit_breaker;
pub mod concurrency;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use concurrency::{ConcurrencyLimiter, RequestPermit};
pub use retries::{RetryExecutor, RetryOutcome};
