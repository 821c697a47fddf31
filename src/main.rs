//! krouter: GRE tunnel and route reconciler.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.yml ──▶ ┌──────────────┐   RouterConfig   ┌──────────────┐
//!                  │    config    │─────────────────▶│  reconcile   │
//!   (edits) ─────▶ │ watcher/hash │                  │    engine    │
//!                  └──────────────┘                  └──────┬───────┘
//!                                                           │ NetworkControl
//!                                                           ▼
//!                                                    ┌──────────────┐
//!                                                    │    netctl    │──▶ ip(8) ──▶ kernel
//!                                                    │   iproute2   │
//!                                                    └──────────────┘
//!
//!   Cross-cutting: lifecycle (startup, watch loop, signals), observability
//! ```

use std::path::PathBuf;

use clap::Parser;

use krouter::config::{ConfigWatcher, DEFAULT_CONFIG_PATH};
use krouter::lifecycle::{self, signals, StartupError, WatchLoop, WatchOutcome};
use krouter::netctl::IpRoute2;
use krouter::observability::{logging, metrics};
use krouter::reconcile::Reconciler;

#[derive(Parser)]
#[command(name = "krouter")]
#[command(about = "Keeps GRE tunnels, static routes and ECMP routes in line with a config file", long_about = None)]
struct Cli {
    /// Path to the YAML (or .toml) configuration file
    #[arg(short, long, env = "KROUTER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Load and validate the config, print it as JSON, and exit
    #[arg(long, conflicts_with = "once")]
    check: bool,

    /// Apply the config once and exit; non-zero status if any item failed
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logging is configured by the file itself, so load errors go to stderr.
    let initial = match lifecycle::load_initial(&cli.config) {
        Ok(initial) => initial,
        Err(e) => {
            eprintln!("krouter: {e}");
            return Err(e.into());
        }
    };

    if cli.check {
        println!("{}", serde_json::to_string_pretty(&initial.config)?);
        return Ok(());
    }

    if let Err(e) = logging::init_logging(&initial.config.program_settings) {
        eprintln!("krouter: {e}");
        return Err(StartupError::from(e).into());
    }
    metrics::init_metrics(&initial.config.program_settings.metrics);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        fingerprint = %initial.fingerprint,
        tunnels = initial.config.gre_tunnels.len(),
        static_routes = initial.config.static_routes.len(),
        ecmp_routes = initial.config.ecmp_routes.len(),
        "krouter starting"
    );

    let reconciler = Reconciler::new(IpRoute2::system());

    if cli.once {
        let report = lifecycle::initial_pass(&reconciler, &initial.config);
        tracing::info!(summary = %report, "Single pass complete");
        if !report.is_converged() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let (watcher, events) = ConfigWatcher::new(&cli.config);
    let _watcher = match watcher.run() {
        Ok(handle) => handle,
        Err(source) => {
            let e = StartupError::Watch {
                path: cli.config.clone(),
                source,
            };
            tracing::error!(error = %e, "Cannot watch configuration");
            return Err(e.into());
        }
    };

    let report = lifecycle::initial_pass(&reconciler, &initial.config);
    tracing::info!(summary = %report, "Initial pass complete");

    let mut watch = WatchLoop::new(initial.detector(&cli.config), reconciler);
    if let WatchOutcome::Applied(report) = watch.catch_up() {
        tracing::info!(summary = %report, "Applied edit made during startup");
    }
    let mut watch_task = tokio::spawn(watch.run(events));

    tokio::select! {
        signal = signals::wait_for_termination() => {
            tracing::info!(signal, "Termination requested, exiting");
            watch_task.abort();
        }
        res = &mut watch_task => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Watch loop task failed");
                return Err(e.into());
            }
            tracing::warn!("Watch loop ended unexpectedly");
        }
    }

    Ok(())
}
