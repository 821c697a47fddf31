//! Mock network backend for testing.
//!
//! Keeps a simulated kernel (tunnels, main-table routes, per-table multipath
//! routes), journals every mutating call in order, and fails selected items
//! on demand. Lets reconciliation be exercised without touching the host.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::config::schema::{EcmpRouteSpec, Nexthop, RouteSelector, StaticRouteSpec, TunnelSpec};
use crate::netctl::runner::CommandError;
use crate::netctl::{NetctlError, NetworkControl, TunnelApplied};

/// A mutating call observed by the mock, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetOp {
    DeleteTunnel(String),
    CreateTunnel(String),
    AddStaticRoute { destination: String, gateway: String },
    AddEcmpRoute { route: String, table: String, nexthops: Vec<Nexthop> },
}

impl NetOp {
    pub fn is_tunnel(&self) -> bool {
        matches!(self, NetOp::DeleteTunnel(_) | NetOp::CreateTunnel(_))
    }
}

#[derive(Debug, Default)]
struct State {
    tunnels: HashSet<String>,
    static_routes: HashSet<(String, String)>,
    ecmp_routes: HashSet<(String, String)>,
    journal: Vec<NetOp>,
    probes: usize,
    failing_tunnels: HashSet<String>,
    failing_static: HashSet<String>,
    failing_ecmp: HashSet<String>,
}

/// A test double that records operations and simulates kernel state.
#[derive(Debug, Default)]
pub struct MockNetwork {
    state: Mutex<State>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with some tunnels already present.
    pub fn with_tunnels<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        mock.state().tunnels.extend(names.into_iter().map(Into::into));
        mock
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make creation of this tunnel fail.
    pub fn fail_tunnel(&self, name: &str) {
        self.state().failing_tunnels.insert(name.to_string());
    }

    /// Make adding a static route to this destination fail.
    pub fn fail_static_route(&self, destination: &str) {
        self.state().failing_static.insert(destination.to_string());
    }

    /// Make adding this multipath selector fail.
    pub fn fail_ecmp_route(&self, route: &str) {
        self.state().failing_ecmp.insert(route.to_string());
    }

    /// Seed a static route as already installed.
    pub fn insert_static_route(&self, destination: &str, gateway: &str) {
        self.state()
            .static_routes
            .insert((destination.to_string(), gateway.to_string()));
    }

    /// All mutating calls so far.
    pub fn journal(&self) -> Vec<NetOp> {
        self.state().journal.clone()
    }

    /// Forget recorded calls, keeping simulated state.
    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }

    /// Number of presence probes answered.
    pub fn probe_count(&self) -> usize {
        self.state().probes
    }

    pub fn has_tunnel(&self, name: &str) -> bool {
        self.state().tunnels.contains(name)
    }

    pub fn has_static_route(&self, destination: &str, gateway: &str) -> bool {
        self.state()
            .static_routes
            .contains(&(destination.to_string(), gateway.to_string()))
    }

    pub fn has_ecmp_route(&self, route: &str, table: &str) -> bool {
        self.state()
            .ecmp_routes
            .contains(&(table.to_string(), route.to_string()))
    }
}

fn injected(command: String) -> CommandError {
    CommandError::Failed {
        command,
        status: Some(2),
        stderr: "RTNETLINK answers: injected failure".to_string(),
    }
}

impl NetworkControl for MockNetwork {
    fn tunnel_exists(&self, name: &str) -> bool {
        let mut state = self.state();
        state.probes += 1;
        state.tunnels.contains(name)
    }

    fn create_or_replace_tunnel(&self, spec: &TunnelSpec) -> Result<TunnelApplied, NetctlError> {
        let mut state = self.state();
        let name = spec.name.clone();

        let replaced = state.tunnels.remove(&name);
        if replaced {
            state.journal.push(NetOp::DeleteTunnel(name.clone()));
        }

        state.journal.push(NetOp::CreateTunnel(name.clone()));
        if state.failing_tunnels.contains(&name) {
            return Err(NetctlError::TunnelCreate {
                source: injected(format!("ip tunnel add {}", name)),
                name,
            });
        }

        state.tunnels.insert(name);
        Ok(TunnelApplied { replaced })
    }

    fn route_exists(&self, route: &StaticRouteSpec) -> bool {
        let mut state = self.state();
        state.probes += 1;
        state
            .static_routes
            .contains(&(route.destination.to_string(), route.gateway.to_string()))
    }

    fn add_static_route(&self, route: &StaticRouteSpec) -> Result<(), NetctlError> {
        let mut state = self.state();
        let destination = route.destination.to_string();
        let gateway = route.gateway.to_string();

        state.journal.push(NetOp::AddStaticRoute {
            destination: destination.clone(),
            gateway: gateway.clone(),
        });
        if state.failing_static.contains(&destination) {
            return Err(NetctlError::StaticRoute {
                route: route.to_string(),
                source: injected(format!("ip route add {}", route)),
            });
        }

        state.static_routes.insert((destination, gateway));
        Ok(())
    }

    fn ecmp_route_exists(&self, route: &RouteSelector, table: &str) -> bool {
        let mut state = self.state();
        state.probes += 1;
        state
            .ecmp_routes
            .contains(&(table.to_string(), route.to_string()))
    }

    fn add_ecmp_route(&self, route: &EcmpRouteSpec) -> Result<(), NetctlError> {
        let mut state = self.state();
        let selector = route.route.to_string();

        state.journal.push(NetOp::AddEcmpRoute {
            route: selector.clone(),
            table: route.table.clone(),
            nexthops: route.nexthops.clone(),
        });

        // Multipath routes through an absent device fail like the kernel would.
        let missing_dev = route.nexthops.iter().any(|hop| !state.tunnels.contains(&hop.dev));
        if missing_dev || state.failing_ecmp.contains(&selector) {
            return Err(NetctlError::EcmpRoute {
                route: selector,
                table: route.table.clone(),
                source: injected(format!("ip route add {} table {}", route.route, route.table)),
            });
        }

        state.ecmp_routes.insert((route.table.clone(), selector));
        Ok(())
    }
}
