//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Read config → Validate → Initial reconcile pass → Seed fingerprint
//!
//! Watch (watch.rs):
//!     File event → Fingerprint check → Load → Reconcile pass
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop watching → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then the first pass
//! - The file watcher is armed before the first pass so edits made while
//!   it runs are not lost; the fingerprint gate makes the replay a no-op
//! - One task owns the watch loop, so passes never overlap

pub mod signals;
pub mod startup;
pub mod watch;

pub use startup::{initial_pass, load_initial, InitialConfig, StartupError};
pub use watch::{WatchLoop, WatchOutcome};
