//! Shared utilities for integration testing.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use krouter::config::{parse_config, ConfigFormat, RouterConfig};

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

/// Two GRE tunnels, one static route per tunnel, and a weighted default
/// route across both in table GRE.
pub const EXAMPLE_CONFIG: &str = r#"
program_settings:
  logging:
    info: true
    error: true
    debug: false

gre_tunnels:
  - name: gre1
    local_ip: 192.0.2.10
    remote_ip: 198.51.100.1
    tunnel_ip: 10.0.40.6
    subnet_mask: 255.255.255.252
  - name: gre2
    local_ip: 192.0.2.10
    remote_ip: 203.0.113.1
    tunnel_ip: 10.0.41.6
    subnet_mask: 30

static_routes:
  - destination: 192.168.50.0/24
    gateway: 10.0.40.5
  - destination: 192.168.51.0/24
    gateway: 10.0.41.5

ecmp_routes:
  - route: default
    table: GRE
    nexthops:
      - { dev: gre1, via: 10.0.40.5, weight: 1 }
      - { dev: gre2, via: 10.0.41.5, weight: 1 }
"#;

/// The example desired state, parsed and validated.
#[allow(dead_code)]
pub fn example_config() -> RouterConfig {
    parse_config(EXAMPLE_CONFIG.as_bytes(), ConfigFormat::Yaml).unwrap()
}

/// Parse a YAML document that is expected to be valid.
#[allow(dead_code)]
pub fn yaml(doc: &str) -> RouterConfig {
    parse_config(doc.as_bytes(), ConfigFormat::Yaml).unwrap()
}

/// A config file in the OS temp dir, removed on drop.
#[allow(dead_code)]
pub struct TempConfig {
    pub path: PathBuf,
}

impl TempConfig {
    #[allow(dead_code)]
    pub fn new(contents: &str) -> Self {
        let n = NEXT_FILE.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("krouter-it-{}-{}.yml", std::process::id(), n));
        fs::write(&path, contents).unwrap();
        Self { path }
    }

    #[allow(dead_code)]
    pub fn write(&self, contents: &str) {
        fs::write(&self.path, contents).unwrap();
    }
}

impl Drop for TempConfig {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
