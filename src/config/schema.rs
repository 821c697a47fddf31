//! Configuration schema definitions.
//!
//! This module defines the desired-state document the reconciler converges
//! the host towards. All types derive Serde traits for deserialization from
//! config files; syntactic checks (address literals, CIDR prefixes, mask
//! shapes) happen here, semantic checks live in `validation.rs`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use ipnetwork::{IpNetwork, ipv4_mask_to_prefix};
use serde::{Deserialize, Deserializer, Serialize};

/// Root of the desired state.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Logging and metrics settings for the daemon itself.
    pub program_settings: ProgramSettings,

    /// GRE tunnels, created in the order given.
    pub gre_tunnels: Vec<TunnelSpec>,

    /// Plain single-gateway routes in the main table.
    pub static_routes: Vec<StaticRouteSpec>,

    /// Weighted multipath route groups.
    pub ecmp_routes: Vec<EcmpRouteSpec>,
}

/// Daemon-level settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProgramSettings {
    /// File the log stream is appended to, in addition to stdout.
    pub log_file_path: Option<PathBuf>,

    /// Enable flags for the log stream.
    pub logging: LoggingConfig,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,
}

/// Log enable flags.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub info: bool,
    pub error: bool,
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            info: true,
            error: true,
            debug: false,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus scrape endpoint.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9105".to_string(),
        }
    }
}

/// A point-to-point GRE tunnel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TunnelSpec {
    /// Interface name (e.g. "gre1").
    pub name: String,

    /// Outer source address.
    pub local_ip: IpAddr,

    /// Outer destination address.
    pub remote_ip: IpAddr,

    /// Address assigned to the tunnel interface itself.
    pub tunnel_ip: IpAddr,

    /// Prefix length of `tunnel_ip`.
    ///
    /// Accepts `30`, `"30"` or a dotted IPv4 netmask like `"255.255.255.252"`.
    #[serde(deserialize_with = "deserialize_prefix_len")]
    pub subnet_mask: u8,
}

impl TunnelSpec {
    /// Interior address in `addr/prefix` form, as handed to `ip addr add`.
    pub fn interior_cidr(&self) -> String {
        format!("{}/{}", self.tunnel_ip, self.subnet_mask)
    }
}

/// A single-gateway route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StaticRouteSpec {
    pub destination: IpNetwork,
    pub gateway: IpAddr,
}

impl fmt::Display for StaticRouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.destination, self.gateway)
    }
}

/// A multipath route group installed into a named routing table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EcmpRouteSpec {
    /// Destination selector ("default" or a CIDR prefix).
    pub route: RouteSelector,

    /// Routing table name or number (e.g. "GRE" from `rt_tables`).
    pub table: String,

    /// Candidate next hops, installed in this order.
    pub nexthops: Vec<Nexthop>,
}

/// One leg of a multipath route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Nexthop {
    /// Outbound device, normally one of the configured tunnels.
    pub dev: String,

    /// Gateway reached through `dev`.
    pub via: IpAddr,

    /// Relative traffic share.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Destination of a multipath route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum RouteSelector {
    Default,
    Prefix(IpNetwork),
}

impl fmt::Display for RouteSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSelector::Default => f.write_str("default"),
            RouteSelector::Prefix(net) => write!(f, "{}", net),
        }
    }
}

impl FromStr for RouteSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("default") {
            return Ok(RouteSelector::Default);
        }
        s.parse::<IpNetwork>()
            .map(RouteSelector::Prefix)
            .map_err(|e| format!("invalid route selector '{}': {}", s, e))
    }
}

impl TryFrom<String> for RouteSelector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RouteSelector> for String {
    fn from(selector: RouteSelector) -> Self {
        selector.to_string()
    }
}

/// Parse a prefix length from an integer, a numeric string or a dotted mask.
pub fn parse_prefix_len(raw: &str) -> Result<u8, String> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('/').unwrap_or(raw);
    if let Ok(len) = raw.parse::<u8>() {
        return Ok(len);
    }
    let mask: Ipv4Addr = raw
        .parse()
        .map_err(|_| format!("invalid subnet mask '{}'", raw))?;
    ipv4_mask_to_prefix(mask).map_err(|_| format!("non-contiguous subnet mask '{}'", raw))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrefix {
    Number(u64),
    Text(String),
}

fn deserialize_prefix_len<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    match RawPrefix::deserialize(deserializer)? {
        RawPrefix::Number(n) => u8::try_from(n)
            .map_err(|_| serde::de::Error::custom(format!("prefix length {} out of range", n))),
        RawPrefix::Text(s) => parse_prefix_len(&s).map_err(serde::de::Error::custom),
    }
}
