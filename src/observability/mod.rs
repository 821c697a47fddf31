//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (one structured event per attempted operation)
//!     → metrics.rs (pass and item counters, pass latency)
//!
//! Consumers:
//!     → stdout and the configured log file
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Failures are visible only through logs; there is no interactive surface
//! - Metrics are cheap and silently dropped when no exporter is installed

pub mod logging;
pub mod metrics;
