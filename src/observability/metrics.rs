//! Metrics collection and exposition.
//!
//! # Metrics
//! - `red_requests_total` (counter): requests by method (`GET`, `HEAD` or
//!   `other`) and status
//! - `red_request_duration_seconds` (histogram): time to select a response
//! - `red_store_lookups_total` (counter): lookups by outcome
//! - `red_delivery_failures_total` (counter): responses the transport lost
//! - `red_active_connections` (gauge): open client connections
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram};
use axum::http::Method;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Bounded label for a request method; clients may send any token.
fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        _ => "other",
    }
}

pub fn record_request(method: &Method, status: u16, start: Instant) {
    counter!(
        "red_requests_total",
        "method" => method_label(method),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("red_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_lookup(outcome: &'static str) {
    counter!("red_store_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_delivery_failure() {
    counter!("red_delivery_failures_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("red_active_connections").set(count as f64);
}
