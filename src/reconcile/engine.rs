//! Three-phase convergence of kernel state towards the desired state.
//!
//! # Phases
//! ```text
//! 1. tunnels        create-or-replace every tunnel, always
//! 2. static routes  add each route the probe does not find
//! 3. ECMP routes    add each group the probe does not find
//! ```
//!
//! Routes may name tunnel devices, so the phases never interleave.
//! A failed item is logged and recorded; its siblings and later phases
//! still run. Nothing is rolled back.

use std::time::Instant;

use crate::config::schema::{EcmpRouteSpec, RouterConfig, StaticRouteSpec, TunnelSpec};
use crate::netctl::iproute2::ecmp_route_args;
use crate::netctl::runner::command_line;
use crate::netctl::NetworkControl;
use crate::observability::metrics;
use crate::reconcile::report::{ItemOutcome, Phase, ReconcileReport};

/// Stateless driver over a network backend.
#[derive(Debug)]
pub struct Reconciler<N> {
    net: N,
}

impl<N: NetworkControl> Reconciler<N> {
    pub fn new(net: N) -> Self {
        Self { net }
    }

    pub fn network(&self) -> &N {
        &self.net
    }

    /// Run one full pass. Observed state is probed fresh for every item.
    pub fn reconcile(&self, desired: &RouterConfig) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport::default();

        for tunnel in &desired.gre_tunnels {
            let outcome = self.apply_tunnel(tunnel);
            record(&mut report, Phase::Tunnels, tunnel.name.clone(), outcome);
        }

        for route in &desired.static_routes {
            let outcome = self.apply_static_route(route);
            record(&mut report, Phase::StaticRoutes, route.to_string(), outcome);
        }

        for group in &desired.ecmp_routes {
            let outcome = self.apply_ecmp_route(group);
            record(
                &mut report,
                Phase::EcmpRoutes,
                format!("{} table {}", group.route, group.table),
                outcome,
            );
        }

        report.set_elapsed(start.elapsed());
        tracing::info!(
            tunnels = desired.gre_tunnels.len(),
            static_routes = desired.static_routes.len(),
            ecmp_routes = desired.ecmp_routes.len(),
            "Reconciliation pass finished: {}",
            report
        );
        report
    }

    fn apply_tunnel(&self, tunnel: &TunnelSpec) -> ItemOutcome {
        match self.net.create_or_replace_tunnel(tunnel) {
            Ok(applied) => {
                tracing::info!(
                    tunnel = %tunnel.name,
                    local = %tunnel.local_ip,
                    remote = %tunnel.remote_ip,
                    address = %tunnel.interior_cidr(),
                    replaced = applied.replaced,
                    "Configured tunnel"
                );
                ItemOutcome::Applied
            }
            Err(e) => {
                tracing::error!(tunnel = %tunnel.name, error = %e, "Failed to configure tunnel");
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    fn apply_static_route(&self, route: &StaticRouteSpec) -> ItemOutcome {
        if self.net.route_exists(route) {
            tracing::debug!(route = %route, "Static route already present");
            return ItemOutcome::AlreadyPresent;
        }

        match self.net.add_static_route(route) {
            Ok(()) => {
                tracing::info!(route = %route, "Added static route");
                ItemOutcome::Applied
            }
            Err(e) => {
                tracing::error!(route = %route, error = %e, "Failed to add static route");
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    fn apply_ecmp_route(&self, group: &EcmpRouteSpec) -> ItemOutcome {
        if self.net.ecmp_route_exists(&group.route, &group.table) {
            tracing::debug!(route = %group.route, table = %group.table, "ECMP route already present");
            return ItemOutcome::AlreadyPresent;
        }

        match self.net.add_ecmp_route(group) {
            Ok(()) => {
                tracing::info!(
                    route = %group.route,
                    table = %group.table,
                    nexthops = group.nexthops.len(),
                    "Added ECMP route: {}",
                    command_line("ip", &ecmp_route_args(group))
                );
                ItemOutcome::Applied
            }
            Err(e) => {
                tracing::error!(route = %group.route, table = %group.table, error = %e, "Failed to add ECMP route");
                ItemOutcome::Failed(e.to_string())
            }
        }
    }
}

fn record(report: &mut ReconcileReport, phase: Phase, item: String, outcome: ItemOutcome) {
    metrics::record_item(phase.as_str(), outcome.as_str());
    report.push(phase, item, outcome);
}
