//! Metric definitions for the relay service.
//!
//! Prometheus naming: `relay_` prefix, `_total` suffix for counters.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if a global recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of live rooms.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    // usize to f64 is exact for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// Set the number of open duplex connections.
///
/// Metric: `relay_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_connections_active").set(count as f64);
}

/// Metric: `relay_rooms_created_total`
pub fn record_room_created() {
    counter!("relay_rooms_created_total").increment(1);
}

/// Record one payload forwarded to one peer.
///
/// Metric: `relay_messages_relayed_total`
/// Labels: `kind` (chat, service)
pub fn record_message_relayed(kind: &'static str) {
    counter!("relay_messages_relayed_total", "kind" => kind).increment(1);
}

/// Record a rejected join.
///
/// Metric: `relay_join_failures_total`
/// Labels: `reason` (see `RelayError::reason`)
pub fn record_join_failure(reason: &'static str) {
    counter!("relay_join_failures_total", "reason" => reason).increment(1);
}

/// Record a datagram handled by the discovery responder.
///
/// Metric: `relay_discovery_probes_total`
/// Labels: `result` (offered, ignored, error)
pub fn record_discovery_probe(result: &'static str) {
    counter!("relay_discovery_probes_total", "result" => result).increment(1);
}
