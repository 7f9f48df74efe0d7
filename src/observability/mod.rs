//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection manager, health checker, scheduler, retry executor:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (in-process counters + `metrics` facade)
//!
//! Consumers:
//!     → stdout (JSON or human-readable)
//!     → Prometheus scrape endpoint (optional)
//!     → periodic snapshot reports
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsCollector, MetricsSnapshot};
