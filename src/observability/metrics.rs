//! Metrics collection and exposition.
//!
//! # Metrics
//! - `limiting_proxy_decisions_total` (counter): admission outcomes by `outcome`
//! - `limiting_proxy_forwarded_total` (counter): relayed responses by `status`
//! - `limiting_proxy_backend_errors_total` (counter): failed backend round-trips
//! - `limiting_proxy_forward_duration_seconds` (histogram): time to backend headers

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_decision(outcome: &'static str) {
    metrics::counter!("limiting_proxy_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_forward(status: u16, start: Instant) {
    metrics::counter!("limiting_proxy_forwarded_total", "status" => status.to_string())
        .increment(1);
    metrics::histogram!("limiting_proxy_forward_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_error() {
    metrics::counter!("limiting_proxy_backend_errors_total").increment(1);
}
