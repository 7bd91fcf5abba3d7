//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_datasources` (gauge): datasources in the registry
//! - `gateway_watch_events_total` (counter): watch events by kind, outcome
//! - `gateway_proxy_cache_total` (counter): proxy cache hits and misses
//! - `gateway_proxy_build_failures_total` (counter): failed builds by reason
//!
//! # Design Decisions
//! - Recording is always on; without an installed exporter the macros are no-ops
//! - Label values come from small fixed sets, never from datasource names

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter, serving scrapes on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [("method", method.to_string()), ("status", status.to_string())];
    ::metrics::counter!("gateway_requests_total", &labels).increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_registry_size(size: usize) {
    ::metrics::gauge!("gateway_datasources").set(size as f64);
}

pub fn record_watch_event(event: &'static str, outcome: &'static str) {
    ::metrics::counter!("gateway_watch_events_total", "event" => event, "outcome" => outcome).increment(1);
}

/// `result` is `"hit"` or `"miss"`.
pub fn record_proxy_cache(result: &'static str) {
    ::metrics::counter!("gateway_proxy_cache_total", "result" => result).increment(1);
}

pub fn record_proxy_build_failure(reason: &'static str) {
    ::metrics::counter!("gateway_proxy_build_failures_total", "reason" => reason).increment(1);
}
