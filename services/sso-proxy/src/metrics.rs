//! Prometheus metrics exposition
//!
//! - `sso_requests_total` (counter): label `outcome`, recorded by the gateway
//! - `upstream_requests_total` (counter): labels `status`, `method`
//! - `upstream_request_duration_seconds` (histogram): label `status`
//! - `upstream_errors_total` (counter): label `error_type`

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "upstream_request_duration_seconds";

/// 5ms to 60s, the range of the configurable upstream timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a completed upstream request.
pub fn record_upstream(status: u16, method: &str, duration_secs: f64) {
    let status = status.to_string();
    metrics::counter!("upstream_requests_total", "status" => status.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "status" => status).record(duration_secs);
}

/// Record a failed upstream call (`timeout`, `connection`, `body`).
pub fn record_upstream_error(error_type: &'static str) {
    metrics::counter!("upstream_errors_total", "error_type" => error_type).increment(1);
}
