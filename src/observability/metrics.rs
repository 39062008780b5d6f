//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method and status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_guard_decisions_total` (counter): entrypoint guard outcomes
//!   (`pass`, `probe`, `deny`)
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Prometheus exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, start_time: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    ::metrics::counter!("gateway_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "method" => method, "status" => status)
        .record(start_time.elapsed().as_secs_f64());
}

/// Record an entrypoint guard decision.
pub fn record_guard(decision: &'static str) {
    ::metrics::counter!("gateway_guard_decisions_total", "decision" => decision).increment(1);
}
