//! Watch loop: re-reconcile whenever the configuration content changes.
//!
//! # States
//! ```text
//! Idle ──(WatchEvent::Changed)──▶ Reconciling ──(always)──▶ Idle
//!
//! Reconciling:
//!     fingerprint unchanged  → no-op
//!     read fails             → log, stay on current kernel state
//!     load/validate fails    → log, stay on current kernel state
//!     otherwise              → commit fingerprint, run one pass
//! ```
//!
//! Events are consumed one at a time from a single task, so passes never
//! overlap; events arriving mid-pass wait in the channel.

use tokio::sync::mpsc;

use crate::config::fingerprint::{Change, ChangeDetector};
use crate::config::loader::{parse_config, ConfigFormat};
use crate::config::watcher::WatchEvent;
use crate::netctl::NetworkControl;
use crate::observability::metrics;
use crate::reconcile::{ReconcileReport, Reconciler};

/// What one event led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Content identical to the last applied configuration.
    Unchanged,
    /// A new configuration was loaded and a pass ran.
    Applied(ReconcileReport),
    /// The file could not be read.
    ReadFailed(String),
    /// The file was read but did not parse or validate.
    LoadFailed(String),
    /// The file-event subsystem reported an error.
    WatcherError(String),
}

/// Owns everything that survives between passes.
pub struct WatchLoop<N> {
    detector: ChangeDetector,
    reconciler: Reconciler<N>,
}

impl<N: NetworkControl> WatchLoop<N> {
    pub fn new(detector: ChangeDetector, reconciler: Reconciler<N>) -> Self {
        Self { detector, reconciler }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn reconciler(&self) -> &Reconciler<N> {
        &self.reconciler
    }

    /// Consume events until the channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WatchEvent>) {
        tracing::info!(path = ?self.detector.path(), "Watching configuration for changes");
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        tracing::info!("Config event channel closed, watch loop exiting");
    }

    /// Re-check the file once. Edits saved before the watcher was armed
    /// produced no event and are picked up here.
    pub fn catch_up(&mut self) -> WatchOutcome {
        self.on_change()
    }

    pub fn handle_event(&mut self, event: WatchEvent) -> WatchOutcome {
        match event {
            WatchEvent::Changed => self.on_change(),
            WatchEvent::Error(e) => {
                tracing::error!(error = %e, "Config watcher error");
                WatchOutcome::WatcherError(e)
            }
        }
    }

    fn on_change(&mut self) -> WatchOutcome {
        let snapshot = match self.detector.check() {
            Ok(Change::Unchanged) => {
                tracing::debug!("Config event with unchanged content, ignoring");
                metrics::record_config_event("unchanged");
                return WatchOutcome::Unchanged;
            }
            Ok(Change::Changed(snapshot)) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Error reading config file");
                metrics::record_reload_failure();
                return WatchOutcome::ReadFailed(e.to_string());
            }
        };
        metrics::record_config_event("changed");

        let format = ConfigFormat::from_path(self.detector.path());
        let config = match parse_config(&snapshot.contents, format) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Error loading config, keeping current kernel state");
                metrics::record_reload_failure();
                return WatchOutcome::LoadFailed(e.to_string());
            }
        };

        self.detector.commit(snapshot.fingerprint);
        tracing::info!(fingerprint = %snapshot.fingerprint, "Configuration changed, reconciling");

        let report = self.reconciler.reconcile(&config);
        metrics::record_pass("watch", report.elapsed());
        WatchOutcome::Applied(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netctl::{MockNetwork, NetOp};
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("krouter-watch-{}-{}", std::process::id(), name))
    }

    const V1: &str = "static_routes:\n  - { destination: 192.168.50.0/24, gateway: 10.0.40.5 }\n";
    const V2: &str = "static_routes:\n  - { destination: 192.168.60.0/24, gateway: 10.0.40.5 }\n";

    #[test]
    fn test_unchanged_content_is_a_no_op() {
        let path = temp_path("noop.yml");
        fs::write(&path, V1).unwrap();
        let mock = MockNetwork::new();
        let mut detector = ChangeDetector::new(&path);
        detector.commit(crate::config::Fingerprint::of(V1.as_bytes()));
        let mut watch = WatchLoop::new(detector, Reconciler::new(&mock));

        assert_eq!(watch.handle_event(WatchEvent::Changed), WatchOutcome::Unchanged);
        assert!(mock.journal().is_empty());
        assert_eq!(mock.probe_count(), 0);
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_changed_content_reconciles() {
        let path = temp_path("change.yml");
        fs::write(&path, V1).unwrap();
        let mock = MockNetwork::new();
        let mut watch = WatchLoop::new(ChangeDetector::new(&path), Reconciler::new(&mock));

        assert!(matches!(watch.handle_event(WatchEvent::Changed), WatchOutcome::Applied(_)));
        assert_eq!(watch.handle_event(WatchEvent::Changed), WatchOutcome::Unchanged);

        fs::write(&path, V2).unwrap();
        assert!(matches!(watch.handle_event(WatchEvent::Changed), WatchOutcome::Applied(_)));
        assert_eq!(
            mock.journal(),
            vec![
                NetOp::AddStaticRoute { destination: "192.168.50.0/24".into(), gateway: "10.0.40.5".into() },
                NetOp::AddStaticRoute { destination: "192.168.60.0/24".into(), gateway: "10.0.40.5".into() },
            ]
        );
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_failure_keeps_fingerprint() {
        let path = temp_path("badload.yml");
        fs::write(&path, V1).unwrap();
        let mock = MockNetwork::new();
        let mut detector = ChangeDetector::new(&path);
        let applied = crate::config::Fingerprint::of(V1.as_bytes());
        detector.commit(applied);
        let mut watch = WatchLoop::new(detector, Reconciler::new(&mock));

        fs::write(&path, "static_routes: [ { destination: nope } ]\n").unwrap();
        assert!(matches!(watch.handle_event(WatchEvent::Changed), WatchOutcome::LoadFailed(_)));
        assert_eq!(watch.detector().current(), Some(applied));
        assert!(mock.journal().is_empty());
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_failure_and_watcher_error() {
        let mock = MockNetwork::new();
        let mut watch = WatchLoop::new(ChangeDetector::new(temp_path("missing.yml")), Reconciler::new(&mock));

        assert!(matches!(watch.handle_event(WatchEvent::Changed), WatchOutcome::ReadFailed(_)));
        assert_eq!(
            watch.handle_event(WatchEvent::Error("inotify queue overflow".into())),
            WatchOutcome::WatcherError("inotify queue overflow".into())
        );
    }

    #[tokio::test]
    async fn test_run_drains_events_in_order() {
        let path = temp_path("run.yml");
        fs::write(&path, V1).unwrap();
        let mock = MockNetwork::new();
        let watch = WatchLoop::new(ChangeDetector::new(&path), Reconciler::new(&mock));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::Changed).unwrap();
        tx.send(WatchEvent::Error("spurious".into())).unwrap();
        tx.send(WatchEvent::Changed).unwrap();
        drop(tx);

        watch.run(rx).await;
        assert_eq!(mock.journal().len(), 1);
        fs::remove_file(path).ok();
    }
}
