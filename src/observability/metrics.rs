//! Metrics collection and exposition.
//!
//! # Metrics
//! - `krouter_reconcile_passes_total` (counter): passes by trigger
//! - `krouter_reconcile_items_total` (counter): items by phase and outcome
//! - `krouter_reconcile_duration_seconds` (histogram): pass latency
//! - `krouter_config_events_total` (counter): watch events by result
//! - `krouter_config_reload_failures_total` (counter): rejected reloads
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Exporter is opt-in via `program_settings.metrics`

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::schema::MetricsConfig;

/// Install the Prometheus exporter if enabled.
pub fn init_metrics(config: &MetricsConfig) {
    if !config.enabled {
        return;
    }

    let addr: SocketAddr = match config.address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(
                metrics_address = %config.address,
                error = %e,
                "Failed to parse metrics address"
            );
            return;
        }
    };

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one reconciliation pass.
pub fn record_pass(trigger: &'static str, elapsed: Duration) {
    metrics::counter!("krouter_reconcile_passes_total", "trigger" => trigger).increment(1);
    metrics::histogram!("krouter_reconcile_duration_seconds").record(elapsed.as_secs_f64());
}

/// Count one item outcome within a pass.
pub fn record_item(phase: &'static str, outcome: &'static str) {
    metrics::counter!(
        "krouter_reconcile_items_total",
        "phase" => phase,
        "outcome" => outcome
    )
    .increment(1);
}

/// Count a filesystem event after fingerprint gating.
pub fn record_config_event(result: &'static str) {
    metrics::counter!("krouter_config_events_total", "result" => result).increment(1);
}

pub fn record_reload_failure() {
    metrics::counter!("krouter_config_reload_failures_total").increment(1);
}
