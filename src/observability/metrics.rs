//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ip_mapper_requests_total` (counter): filter outcomes by `outcome`
//! - `ip_mapper_label_matches_total` (counter): matches by `label`
//! - `ip_mapper_spoofed_headers_total` (counter): stripped client-sent label headers
//! - `ip_mapper_mapping_loads_total` (counter): mapping loads by `result`
//! - `ip_mapper_mapping_load_seconds` (histogram): time to read and parse the file

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_outcome(outcome: &'static str) {
    metrics::counter!("ip_mapper_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_label_match(label: &str) {
    metrics::counter!("ip_mapper_label_matches_total", "label" => label.to_string()).increment(1);
}

pub fn record_spoofed_header() {
    metrics::counter!("ip_mapper_spoofed_headers_total").increment(1);
}

pub fn record_mapping_load(result: &'static str, start: Instant) {
    metrics::counter!("ip_mapper_mapping_loads_total", "result" => result).increment(1);
    metrics::histogram!("ip_mapper_mapping_load_seconds").record(start.elapsed().as_secs_f64());
}
