//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_guard_blocked_total` (counter): requests blocked, by `category`
//! - `ingress_guard_screen_seconds` (histogram): pipeline latency
//! - `ingress_guard_errors_total` (counter): error responses, by `type`, `status`
//! - `ingress_guard_csrf_tokens_swept_total` (counter): expired tokens removed
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus listener only starts when enabled in configuration

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::ErrorType;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_blocked(category: &str) {
    counter!("ingress_guard_blocked_total", "category" => category.to_string()).increment(1);
}

pub fn record_screen_duration(start: Instant) {
    histogram!("ingress_guard_screen_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_error(error_type: ErrorType, status: u16) {
    counter!(
        "ingress_guard_errors_total",
        "type" => error_type.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_tokens_swept(removed: usize) {
    counter!("ingress_guard_csrf_tokens_swept_total").increment(removed as u64);
}
