//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check per-item invariants (name shape, address families, prefix ranges)
//! - Detect duplicate tunnel names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Nexthop devices are not resolved against the tunnel list; an unknown
//!   device only fails when the route is applied

use std::collections::HashSet;
use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::{EcmpRouteSpec, RouteSelector, RouterConfig, StaticRouteSpec, TunnelSpec};

/// Longest interface name the kernel accepts (IFNAMSIZ - 1).
pub const MAX_IFNAME_LEN: usize = 15;

/// Largest multipath nexthop weight the kernel accepts.
pub const MAX_NEXTHOP_WEIGHT: u32 = 256;

/// A single semantic problem in the desired state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tunnel #{index}: name is empty")]
    EmptyTunnelName { index: usize },

    #[error("tunnel '{name}': name longer than 15 bytes")]
    TunnelNameTooLong { name: String },

    #[error("tunnel '{name}': name contains whitespace or '/'")]
    InvalidTunnelName { name: String },

    #[error("tunnel '{name}': declared more than once")]
    DuplicateTunnel { name: String },

    #[error("tunnel '{name}': local and remote addresses mix IPv4 and IPv6")]
    MixedTunnelFamilies { name: String },

    #[error("tunnel '{name}': prefix length {prefix} exceeds {max}")]
    PrefixTooLong { name: String, prefix: u8, max: u8 },

    #[error("static route {route}: gateway and destination are different address families")]
    StaticRouteFamilyMismatch { route: String },

    #[error("ECMP route {route}: table name is empty or contains whitespace")]
    InvalidTable { route: String },

    #[error("ECMP route {route} (table {table}): no nexthops")]
    NoNexthops { route: String, table: String },

    #[error("ECMP route {route}: nexthop #{index} has an empty device")]
    EmptyNexthopDevice { route: String, index: usize },

    #[error("ECMP route {route}: nexthop #{index} weight {weight} outside 1..=256")]
    InvalidWeight { route: String, index: usize, weight: u32 },

    #[error("ECMP route {route}: nexthop #{index} via {via} is not in the route's address family")]
    NexthopFamilyMismatch { route: String, index: usize, via: IpAddr },
}

/// Validate the whole desired state, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (index, tunnel) in config.gre_tunnels.iter().enumerate() {
        validate_tunnel(index, tunnel, &mut errors);
        if !tunnel.name.is_empty() && !seen.insert(tunnel.name.as_str()) {
            errors.push(ValidationError::DuplicateTunnel {
                name: tunnel.name.clone(),
            });
        }
    }

    for route in &config.static_routes {
        validate_static_route(route, &mut errors);
    }

    for route in &config.ecmp_routes {
        validate_ecmp_route(route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tunnel(index: usize, tunnel: &TunnelSpec, errors: &mut Vec<ValidationError>) {
    let name = &tunnel.name;
    if name.is_empty() {
        errors.push(ValidationError::EmptyTunnelName { index });
        return;
    }
    if name.len() > MAX_IFNAME_LEN {
        errors.push(ValidationError::TunnelNameTooLong { name: name.clone() });
    }
    if name.chars().any(|c| c.is_whitespace() || c == '/') {
        errors.push(ValidationError::InvalidTunnelName { name: name.clone() });
    }

    // The interior address may be either family; only the outer endpoints must agree.
    if tunnel.local_ip.is_ipv4() != tunnel.remote_ip.is_ipv4() {
        errors.push(ValidationError::MixedTunnelFamilies { name: name.clone() });
    }

    let max = family_max_prefix(&tunnel.tunnel_ip);
    if tunnel.subnet_mask > max {
        errors.push(ValidationError::PrefixTooLong {
            name: name.clone(),
            prefix: tunnel.subnet_mask,
            max,
        });
    }
}

fn validate_static_route(route: &StaticRouteSpec, errors: &mut Vec<ValidationError>) {
    if route.destination.is_ipv4() != route.gateway.is_ipv4() {
        errors.push(ValidationError::StaticRouteFamilyMismatch {
            route: route.to_string(),
        });
    }
}

fn validate_ecmp_route(route: &EcmpRouteSpec, errors: &mut Vec<ValidationError>) {
    let selector = route.route.to_string();

    if route.table.is_empty() || route.table.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidTable {
            route: selector.clone(),
        });
    }

    if route.nexthops.is_empty() {
        errors.push(ValidationError::NoNexthops {
            route: selector.clone(),
            table: route.table.clone(),
        });
    }

    for (index, hop) in route.nexthops.iter().enumerate() {
        if hop.dev.trim().is_empty() {
            errors.push(ValidationError::EmptyNexthopDevice {
                route: selector.clone(),
                index,
            });
        }
        if hop.weight == 0 || hop.weight > MAX_NEXTHOP_WEIGHT {
            errors.push(ValidationError::InvalidWeight {
                route: selector.clone(),
                index,
                weight: hop.weight,
            });
        }
        if let RouteSelector::Prefix(net) = route.route {
            if net.is_ipv4() != hop.via.is_ipv4() {
                errors.push(ValidationError::NexthopFamilyMismatch {
                    route: selector.clone(),
                    index,
                    via: hop.via,
                });
            }
        }
    }
}

fn family_max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}
