//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate the initial configuration (fatal on failure)
//! - Run the first reconciliation pass
//! - Seed the change detector with the applied fingerprint
//!
//! # Design Decisions
//! - Fail fast: an unreadable or invalid initial config is fatal
//! - Tunnel failures in the first pass are logged like any other item
//!   failure and do not abort startup; a host with one unreachable peer
//!   still gets the rest of its routing

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::fingerprint::{ChangeDetector, Fingerprint, FingerprintError, Snapshot};
use crate::config::loader::{parse_config, ConfigError, ConfigFormat};
use crate::config::schema::RouterConfig;
use crate::netctl::NetworkControl;
use crate::observability::logging::LoggingError;
use crate::observability::metrics;
use crate::reconcile::{ReconcileReport, Reconciler};

/// Conditions that stop the process before it reaches the watch state.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("error reading initial config: {0}")]
    Read(#[from] FingerprintError),

    #[error("error loading initial config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// The first configuration read at startup.
#[derive(Debug, Clone)]
pub struct InitialConfig {
    pub config: RouterConfig,
    pub fingerprint: Fingerprint,
}

impl InitialConfig {
    /// Detector that treats this configuration as already applied.
    pub fn detector(&self, path: &Path) -> ChangeDetector {
        let mut detector = ChangeDetector::new(path);
        detector.commit(self.fingerprint);
        detector
    }
}

/// Read, parse and validate the configuration at `path`.
pub fn load_initial(path: &Path) -> Result<InitialConfig, StartupError> {
    let snapshot = Snapshot::read(path)?;
    let config = parse_config(&snapshot.contents, ConfigFormat::from_path(path)).map_err(|source| {
        StartupError::Config {
            path: path.to_path_buf(),
            source,
        }
    })?;

    Ok(InitialConfig {
        config,
        fingerprint: snapshot.fingerprint,
    })
}

/// Run the startup pass.
pub fn initial_pass<N: NetworkControl>(reconciler: &Reconciler<N>, config: &RouterConfig) -> ReconcileReport {
    tracing::info!("Applying initial configuration");
    let report = reconciler.reconcile(config);
    metrics::record_pass("startup", report.elapsed());

    for failure in report.failures() {
        tracing::warn!(
            phase = %failure.phase,
            item = %failure.item,
            "Item not converged at startup; will be retried on the next config change"
        );
    }
    report
}
