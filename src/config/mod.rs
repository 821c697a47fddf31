//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML)
//!     → fingerprint.rs (read bytes once, hash)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable desired state)
//!     → handed to one reconciliation pass, then dropped
//!
//! On file change:
//!     watcher.rs detects write
//!     → fingerprint.rs compares against last applied hash
//!     → (differs) loader.rs parses the same bytes
//!     → new RouterConfig fully replaces the old one
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Program settings have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The stored fingerprint only advances after a successful load

pub mod fingerprint;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use fingerprint::{Change, ChangeDetector, Fingerprint};
pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{
    EcmpRouteSpec, LoggingConfig, MetricsConfig, Nexthop, ProgramSettings, RouteSelector,
    RouterConfig, StaticRouteSpec, TunnelSpec,
};
pub use watcher::{ConfigWatcher, WatchEvent};

/// Path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/krouter/config.yml";
