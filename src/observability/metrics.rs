//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): proxied requests by method, status, backend
//! - `lb_request_duration_seconds` (histogram): proxied request latency
//! - `lb_backend_alive` (gauge): 1=alive, 0=dead, per backend
//! - `lb_rate_limited_total` (counter): requests rejected with 429
//! - `lb_rate_limit_buckets` (gauge): in-memory token buckets

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("lb_requests_total", &labels).increment(1);
    histogram!("lb_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("lb_backend_alive", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}

pub fn record_rate_limited() {
    counter!("lb_rate_limited_total").increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("lb_rate_limit_buckets").set(count as f64);
}
