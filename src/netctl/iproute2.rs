//! `NetworkControl` backed by the iproute2 `ip` utility.

use ipnetwork::IpNetwork;

use crate::config::schema::{EcmpRouteSpec, RouteSelector, StaticRouteSpec, TunnelSpec};
use crate::netctl::runner::{command_line, CommandRunner, SystemRunner};
use crate::netctl::{NetctlError, NetworkControl, TunnelApplied};

const IP: &str = "ip";

/// Drives the kernel through `ip` invocations.
#[derive(Debug, Default)]
pub struct IpRoute2<R = SystemRunner> {
    runner: R,
}

impl IpRoute2<SystemRunner> {
    pub fn system() -> Self {
        Self { runner: SystemRunner }
    }
}

impl<R: CommandRunner> IpRoute2<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn ip(&self, args: Vec<String>) -> Result<String, crate::netctl::CommandError> {
        self.runner.run(IP, &args)
    }

    /// Run a read-only `ip ... show`; failures read as empty output.
    fn show(&self, args: Vec<String>) -> String {
        match self.runner.run(IP, &args) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(error = %e, "Presence probe failed, treating as absent");
                String::new()
            }
        }
    }
}

/// Build an argument vector from anything printable.
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($arg.to_string()),*]
    };
}

/// Arguments for `ip tunnel add`.
pub fn tunnel_add_args(spec: &TunnelSpec) -> Vec<String> {
    args![
        "tunnel",
        "add",
        spec.name,
        "mode",
        "gre",
        "local",
        spec.local_ip,
        "remote",
        spec.remote_ip,
    ]
}

/// A prefix as `ip route show` prints it: network address, no length on host routes.
pub fn listed_prefix(net: &IpNetwork) -> String {
    let host_len = match net {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if net.prefix() == host_len {
        net.ip().to_string()
    } else {
        format!("{}/{}", net.network(), net.prefix())
    }
}

fn listed_selector(route: &RouteSelector) -> String {
    match route {
        RouteSelector::Default => "default".to_string(),
        RouteSelector::Prefix(net) => listed_prefix(net),
    }
}

/// `ip route show` for the family of `net`; IPv6 routes are only listed with `-6`.
fn route_show_args(net: Option<&IpNetwork>) -> Vec<String> {
    match net {
        Some(IpNetwork::V6(_)) => args!["-6", "route", "show"],
        _ => args!["route", "show"],
    }
}

/// Arguments for a single multipath `ip route add`, nexthops in config order.
pub fn ecmp_route_args(spec: &EcmpRouteSpec) -> Vec<String> {
    let mut args = args![
        "route",
        "add",
        spec.route,
        "proto",
        "static",
        "scope",
        "global",
        "table",
        spec.table,
    ];
    for hop in &spec.nexthops {
        args.extend(args![
            "nexthop",
            "dev",
            hop.dev,
            "via",
            hop.via,
            "weight",
            hop.weight,
        ]);
    }
    args
}

impl<R: CommandRunner> NetworkControl for IpRoute2<R> {
    fn tunnel_exists(&self, name: &str) -> bool {
        self.show(args!["tunnel", "show"]).contains(name)
    }

    fn create_or_replace_tunnel(&self, spec: &TunnelSpec) -> Result<TunnelApplied, NetctlError> {
        let name = &spec.name;

        let mut replaced = false;
        if self.tunnel_exists(name) {
            match self.ip(args!["tunnel", "del", name]) {
                Ok(_) => replaced = true,
                Err(e) => {
                    tracing::warn!(tunnel = %name, error = %e, "Failed to delete existing tunnel");
                }
            }
        }

        self.ip(tunnel_add_args(spec))
            .map_err(|source| NetctlError::TunnelCreate {
                name: name.clone(),
                source,
            })?;

        let address = spec.interior_cidr();
        self.ip(args!["addr", "add", &address, "dev", name])
            .map_err(|source| NetctlError::TunnelAddress {
                name: name.clone(),
                address: address.clone(),
                source,
            })?;

        self.ip(args!["link", "set", name, "up"])
            .map_err(|source| NetctlError::TunnelLinkUp {
                name: name.clone(),
                source,
            })?;

        Ok(TunnelApplied { replaced })
    }

    fn route_exists(&self, route: &StaticRouteSpec) -> bool {
        let output = self.show(route_show_args(Some(&route.destination)));
        output.contains(&listed_prefix(&route.destination)) && output.contains(&route.gateway.to_string())
    }

    fn add_static_route(&self, route: &StaticRouteSpec) -> Result<(), NetctlError> {
        self.ip(args![
            "route",
            "add",
            route.destination,
            "via",
            route.gateway,
        ])
        .map(|_| ())
        .map_err(|source| NetctlError::StaticRoute {
            route: route.to_string(),
            source,
        })
    }

    fn ecmp_route_exists(&self, route: &RouteSelector, table: &str) -> bool {
        let selector = listed_selector(route);
        let prefix = match route {
            RouteSelector::Default => None,
            RouteSelector::Prefix(net) => Some(net),
        };
        let mut show = route_show_args(prefix);
        show.extend(args!["table", table]);
        self.show(show)
            .lines()
            .any(|line| line.contains(&selector))
    }

    fn add_ecmp_route(&self, route: &EcmpRouteSpec) -> Result<(), NetctlError> {
        let args = ecmp_route_args(route);
        tracing::debug!(command = %command_line(IP, &args), "Installing multipath route");
        self.ip(args)
            .map(|_| ())
            .map_err(|source| NetctlError::EcmpRoute {
                route: route.route.to_string(),
                table: route.table.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Nexthop;
    use crate::netctl::CommandError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every invocation and answers from a table keyed by command line.
    #[derive(Default)]
    struct ScriptedRunner {
        responses: HashMap<String, Result<String, CommandError>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn respond(mut self, line: &str, result: Result<&str, &str>) -> Self {
            let result = result.map(str::to_string).map_err(|stderr| CommandError::Failed {
                command: line.to_string(),
                status: Some(2),
                stderr: stderr.to_string(),
            });
            self.responses.insert(line.to_string(), result);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
            let line = command_line(program, args);
            self.calls.lock().unwrap().push(line.clone());
            self.responses.get(&line).cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn tunnel() -> TunnelSpec {
        TunnelSpec {
            name: "gre1".into(),
            local_ip: "192.0.2.1".parse().unwrap(),
            remote_ip: "198.51.100.1".parse().unwrap(),
            tunnel_ip: "10.0.40.6".parse().unwrap(),
            subnet_mask: 30,
        }
    }

    fn ecmp_group() -> EcmpRouteSpec {
        EcmpRouteSpec {
            route: RouteSelector::Default,
            table: "GRE".into(),
            nexthops: vec![
                Nexthop { dev: "gre1".into(), via: "10.0.40.5".parse().unwrap(), weight: 1 },
                Nexthop { dev: "gre2".into(), via: "10.0.41.5".parse().unwrap(), weight: 1 },
            ],
        }
    }

    #[test]
    fn test_ecmp_args_keep_nexthop_order() {
        let args = ecmp_route_args(&ecmp_group());
        assert_eq!(
            command_line(IP, &args),
            "ip route add default proto static scope global table GRE \
             nexthop dev gre1 via 10.0.40.5 weight 1 \
             nexthop dev gre2 via 10.0.41.5 weight 1"
        );
    }

    #[test]
    fn test_fresh_tunnel_skips_delete() {
        let net = IpRoute2::new(ScriptedRunner::default());
        let applied = net.create_or_replace_tunnel(&tunnel()).unwrap();

        assert!(!applied.replaced);
        assert_eq!(
            net.runner().calls(),
            vec![
                "ip tunnel show",
                "ip tunnel add gre1 mode gre local 192.0.2.1 remote 198.51.100.1",
                "ip addr add 10.0.40.6/30 dev gre1",
                "ip link set gre1 up",
            ]
        );
    }

    #[test]
    fn test_existing_tunnel_is_replaced() {
        let runner = ScriptedRunner::default()
            .respond("ip tunnel show", Ok("gre1: gre/ip remote 198.51.100.1 local 192.0.2.1 ttl inherit\n"));
        let net = IpRoute2::new(runner);

        let applied = net.create_or_replace_tunnel(&tunnel()).unwrap();
        assert!(applied.replaced);
        assert_eq!(net.runner().calls()[1], "ip tunnel del gre1");
        assert_eq!(net.runner().calls().len(), 5);
    }

    #[test]
    fn test_delete_failure_is_not_fatal() {
        let runner = ScriptedRunner::default()
            .respond("ip tunnel show", Ok("gre1: gre/ip remote any local any\n"))
            .respond("ip tunnel del gre1", Err("delete tunnel failed"));
        let net = IpRoute2::new(runner);

        let applied = net.create_or_replace_tunnel(&tunnel()).unwrap();
        assert!(!applied.replaced);
        assert_eq!(net.runner().calls().last().unwrap(), "ip link set gre1 up");
    }

    #[test]
    fn test_create_failure_stops_tunnel() {
        let runner = ScriptedRunner::default().respond(
            "ip tunnel add gre1 mode gre local 192.0.2.1 remote 198.51.100.1",
            Err("add tunnel \"gre0\" failed: File exists"),
        );
        let net = IpRoute2::new(runner);

        let err = net.create_or_replace_tunnel(&tunnel()).unwrap_err();
        assert!(matches!(err, NetctlError::TunnelCreate { .. }));
        assert_eq!(net.runner().calls().len(), 2);
    }

    #[test]
    fn test_address_failure_reports_step() {
        let runner = ScriptedRunner::default()
            .respond("ip addr add 10.0.40.6/30 dev gre1", Err("RTNETLINK answers: File exists"));
        let net = IpRoute2::new(runner);

        match net.create_or_replace_tunnel(&tunnel()).unwrap_err() {
            NetctlError::TunnelAddress { address, .. } => assert_eq!(address, "10.0.40.6/30"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_route_exists_is_coarse_containment() {
        let listing = "default via 192.0.2.254 dev eth0\n\
                       192.168.50.0/24 dev eth1 scope link\n\
                       10.0.40.4/30 dev gre1 proto kernel scope link src 10.0.40.5\n";
        let net = IpRoute2::new(ScriptedRunner::default().respond("ip route show", Ok(listing)));
        let route = StaticRouteSpec {
            destination: "192.168.50.0/24".parse().unwrap(),
            gateway: "10.0.40.5".parse().unwrap(),
        };

        // Both strings occur, on different lines: still reported present.
        assert!(net.route_exists(&route));

        let absent = StaticRouteSpec {
            destination: "192.168.60.0/24".parse().unwrap(),
            gateway: "10.0.40.5".parse().unwrap(),
        };
        assert!(!net.route_exists(&absent));
    }

    #[test]
    fn test_listed_prefix_matches_iproute2_output() {
        let host: IpNetwork = "192.168.1.1".parse().unwrap();
        assert_eq!(listed_prefix(&host), "192.168.1.1");
        let host6: IpNetwork = "2001:db8::1/128".parse().unwrap();
        assert_eq!(listed_prefix(&host6), "2001:db8::1");
        let net: IpNetwork = "192.168.50.7/24".parse().unwrap();
        assert_eq!(listed_prefix(&net), "192.168.50.0/24");
        let net6: IpNetwork = "2001:db8:100::/48".parse().unwrap();
        assert_eq!(listed_prefix(&net6), "2001:db8:100::/48");
    }

    #[test]
    fn test_host_route_already_present() {
        let listing = "default via 192.0.2.254 dev eth0\n\
                       192.168.1.1 via 10.0.40.5 dev gre1\n";
        let net = IpRoute2::new(ScriptedRunner::default().respond("ip route show", Ok(listing)));
        let route = StaticRouteSpec {
            destination: "192.168.1.1".parse().unwrap(),
            gateway: "10.0.40.5".parse().unwrap(),
        };
        assert!(net.route_exists(&route));
    }

    #[test]
    fn test_ipv6_route_probes_the_ipv6_table() {
        let listing = "2001:db8:100::/48 via 2001:db8:40::5 dev gre1 metric 1024 pref medium\n";
        let net = IpRoute2::new(ScriptedRunner::default().respond("ip -6 route show", Ok(listing)));
        let route = StaticRouteSpec {
            destination: "2001:db8:100::/48".parse().unwrap(),
            gateway: "2001:db8:40::5".parse().unwrap(),
        };

        assert!(net.route_exists(&route));
        assert_eq!(net.runner().calls(), vec!["ip -6 route show"]);
    }

    #[test]
    fn test_ecmp_host_selector_and_ipv6_table() {
        let net = IpRoute2::new(
            ScriptedRunner::default()
                .respond("ip route show table 100", Ok("10.9.0.1 proto static\n"))
                .respond("ip -6 route show table 100", Ok("2001:db8:9::/64 proto static metric 1024\n")),
        );

        assert!(net.ecmp_route_exists(&"10.9.0.1/32".parse().unwrap(), "100"));
        assert!(net.ecmp_route_exists(&"2001:db8:9::/64".parse().unwrap(), "100"));
    }

    #[test]
    fn test_ecmp_route_exists_scans_table() {
        let listing = "default proto static metric 1024\n\
                       \tnexthop via 10.0.40.5 dev gre1 weight 1\n";
        let net = IpRoute2::new(
            ScriptedRunner::default().respond("ip route show table GRE", Ok(listing)),
        );

        assert!(net.ecmp_route_exists(&RouteSelector::Default, "GRE"));
        assert!(!net.ecmp_route_exists(&"10.9.0.0/16".parse().unwrap(), "GRE"));
        assert!(!net.ecmp_route_exists(&RouteSelector::Default, "OTHER"));
    }

    #[test]
    fn test_probe_failure_reads_as_absent() {
        let net = IpRoute2::new(
            ScriptedRunner::default().respond("ip tunnel show", Err("Cannot open netlink socket")),
        );
        assert!(!net.tunnel_exists("gre1"));
    }

    #[test]
    fn test_add_ecmp_route_failure() {
        let group = ecmp_group();
        let line = command_line(IP, &ecmp_route_args(&group));
        let net = IpRoute2::new(
            ScriptedRunner::default().respond(&line, Err("Error: Nexthop device is not up.")),
        );

        let err = net.add_ecmp_route(&group).unwrap_err();
        assert!(err.to_string().contains("table GRE"));
        assert_eq!(net.runner().calls(), vec![line]);
    }
}
