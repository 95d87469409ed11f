//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_errors_total` (counter): rendered error responses by status and
//!   body format (`json`, `xml`, `text`)
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - The Prometheus endpoint is optional and off by default

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one rendered error response.
pub fn record_error(status: u16, format: &'static str) {
    metrics::counter!(
        "http_errors_total",
        "status" => status.to_string(),
        "format" => format
    )
    .increment(1);
}
