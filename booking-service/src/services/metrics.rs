use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the process-wide Prometheus recorder. Safe to call repeatedly;
/// only the first call installs.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .and_then(Option::as_ref)
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_booking_created() {
    counter!("bookings_created_total").increment(1);
}

pub fn record_booking_conflict() {
    counter!("booking_conflicts_total").increment(1);
}

/// `source` is the path that moved the payment: `manual`, `notification` or `gateway`.
pub fn record_payment_transition(source: &'static str, status: &'static str) {
    counter!("payment_transitions_total", "source" => source, "status" => status).increment(1);
}

pub fn record_gateway_failure(operation: &'static str) {
    counter!("gateway_failures_total", "operation" => operation).increment(1);
}

pub fn record_notification_ignored(reason: &'static str) {
    counter!("notifications_ignored_total", "reason" => reason).increment(1);
}

pub fn record_db_query(operation: &'static str, started: Instant) {
    histogram!("db_query_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
