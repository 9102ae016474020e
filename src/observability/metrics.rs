//! Metrics exposition.
//!
//! # Metrics
//! - `supervisor_active_requests` (gauge): live entries per supervisor
//! - `supervisor_registered_total` (counter): registrations per supervisor
//! - `supervisor_expired_total` (counter): timeouts fired per supervisor
//! - `supervisor_usage_errors_total` (counter): entries swept without a timeout
//! - `dedup_hits_total` / `dedup_misses_total` (counter): by method
//! - `transport_outcomes_total` (counter): by outcome
//! - `poll_outcomes_total` (counter): by watch target and outcome
//!
//! Recording goes through the `metrics` macros at the call sites; without an
//! installed recorder they are no-ops.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
