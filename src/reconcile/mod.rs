//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! RouterConfig (desired)
//!     → engine.rs
//!         → tunnel phase       (NetworkControl::create_or_replace_tunnel)
//!         → static route phase (route_exists? else add_static_route)
//!         → ECMP phase         (ecmp_route_exists? else add_ecmp_route)
//!     → report.rs (per-item outcome, pass summary)
//! ```
//!
//! # Design Decisions
//! - No state survives a pass; kernel state is probed fresh each time
//! - Per-item failures are soft: logged once, recorded, never retried
//! - Tunnel creation failures are soft on every pass, startup included

pub mod engine;
pub mod report;

pub use engine::Reconciler;
pub use report::{ItemOutcome, ItemReport, Phase, ReconcileReport};
