//! GRE tunnel and route reconciler.
//!
//! Reads a declarative description of GRE tunnels and the routes that
//! ride on them, drives the kernel towards it and re-applies it
//! whenever the configuration file's content changes.

pub mod config;
pub mod lifecycle;
pub mod netctl;
pub mod observability;
pub mod reconcile;

pub use config::schema::RouterConfig;
pub use lifecycle::WatchLoop;
pub use netctl::{IpRoute2, MockNetwork, NetworkControl};
pub use reconcile::{ReconcileReport, Reconciler};
