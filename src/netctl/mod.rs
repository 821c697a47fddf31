//! Network control subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciler intent ("ensure tunnel T", "ensure route R", "ensure group E")
//!     → NetworkControl trait (capability-level operations)
//!     → iproute2.rs (renders `ip` argument vectors)
//!     → runner.rs (spawns the process, captures stdout/stderr)
//!     → kernel state
//! ```
//!
//! # Design Decisions
//! - Presence probes are best-effort reads of live state, re-run every pass
//! - Probes answer `bool`; a probe that cannot run reads as "absent"
//! - Tunnels are always torn down and recreated, never diffed
//! - Calls are synchronous and blocking with no timeout
//! - mock.rs provides an in-memory kernel for tests

pub mod iproute2;
pub mod mock;
pub mod runner;

use thiserror::Error;

use crate::config::schema::{EcmpRouteSpec, RouteSelector, StaticRouteSpec, TunnelSpec};

pub use iproute2::IpRoute2;
pub use mock::{MockNetwork, NetOp};
pub use runner::{CommandError, CommandRunner, SystemRunner};

/// Failure of a mutating network operation.
#[derive(Debug, Clone, Error)]
pub enum NetctlError {
    #[error("failed to create tunnel {name}: {source}")]
    TunnelCreate {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to assign address {address} to tunnel {name}: {source}")]
    TunnelAddress {
        name: String,
        address: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to bring up tunnel {name}: {source}")]
    TunnelLinkUp {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to add static route {route}: {source}")]
    StaticRoute {
        route: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to add ECMP route {route} in table {table}: {source}")]
    EcmpRoute {
        route: String,
        table: String,
        #[source]
        source: CommandError,
    },
}

/// Outcome of a successful tunnel (re)creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelApplied {
    /// A tunnel of the same name existed and was deleted first.
    pub replaced: bool,
}

/// Capability-level view of the host's network configuration.
pub trait NetworkControl: Send {
    /// Whether a tunnel interface with this name is present.
    fn tunnel_exists(&self, name: &str) -> bool;

    /// Delete any tunnel of the same name, then create, address and raise it.
    ///
    /// Failing to delete the old tunnel is logged and ignored.
    fn create_or_replace_tunnel(&self, spec: &TunnelSpec) -> Result<TunnelApplied, NetctlError>;

    /// Coarse presence check: destination and gateway each appear somewhere in
    /// the route listing, not necessarily on the same line.
    fn route_exists(&self, route: &StaticRouteSpec) -> bool;

    fn add_static_route(&self, route: &StaticRouteSpec) -> Result<(), NetctlError>;

    /// Whether any line of `table` mentions the selector.
    fn ecmp_route_exists(&self, route: &RouteSelector, table: &str) -> bool;

    /// Install all nexthops of the group as one multipath route.
    fn add_ecmp_route(&self, route: &EcmpRouteSpec) -> Result<(), NetctlError>;
}

impl<N: NetworkControl + Sync + ?Sized> NetworkControl for &N {
    fn tunnel_exists(&self, name: &str) -> bool {
        (**self).tunnel_exists(name)
    }

    fn create_or_replace_tunnel(&self, spec: &TunnelSpec) -> Result<TunnelApplied, NetctlError> {
        (**self).create_or_replace_tunnel(spec)
    }

    fn route_exists(&self, route: &StaticRouteSpec) -> bool {
        (**self).route_exists(route)
    }

    fn add_static_route(&self, route: &StaticRouteSpec) -> Result<(), NetctlError> {
        (**self).add_static_route(route)
    }

    fn ecmp_route_exists(&self, route: &RouteSelector, table: &str) -> bool {
        (**self).ecmp_route_exists(route, table)
    }

    fn add_ecmp_route(&self, route: &EcmpRouteSpec) -> Result<(), NetctlError> {
        (**self).add_ecmp_route(route)
    }
}
