//! Prometheus metrics for gateway traffic.
//!
//! Handlers record through the `metrics` facade; [`handle`] owns the
//! process-wide Prometheus recorder that renders `/metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder once and return its handle.
///
/// If another recorder is already installed (for example by an embedding
/// application) a detached recorder is used so `/metrics` still renders.
pub fn handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Prometheus recorder not installed globally: {}", e);
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Count a finished request by endpoint and response status.
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "hlsgate_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record how long an endpoint took to produce its response head.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("hlsgate_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Count an upstream transport failure.
pub fn record_upstream_error() {
    counter!("hlsgate_upstream_errors_total").increment(1);
}

/// Count a playlist rewritten through the gateway.
pub fn record_playlist_rewrite() {
    counter!("hlsgate_playlists_rewritten_total").increment(1);
}
