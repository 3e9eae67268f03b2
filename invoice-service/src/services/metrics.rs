//! Metrics collection and Prometheus export.
//!
//! Installs the Prometheus recorder and exposes the rendered text for the
//! /metrics endpoint, plus the domain counters this service records.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Safe to call more than once: only the first call installs a recorder, so
/// several applications built in one process (tests) share it.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!("Metrics recorder already installed: {}", e);
        }
        handle
    });
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_invoice_event(event: &'static str, status: &'static str) {
    metrics::counter!("invoices_total", "event" => event, "status" => status).increment(1);
}

pub fn record_profile_event(event: &'static str) {
    metrics::counter!("business_profiles_total", "event" => event).increment(1);
}
