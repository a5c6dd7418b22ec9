//! Metrics collection and exposition.
//!
//! # Metrics
//! - `custody_accounts_created_total` (counter)
//! - `custody_transactions_total` (counter): by operation, outcome
//! - `custody_confirmation_seconds` (histogram): broadcast to receipt latency
//! - `custody_rpc_retries_total` (counter): by call

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_account_created() {
    metrics::counter!("custody_accounts_created_total").increment(1);
}

/// Record the terminal outcome of one transaction.
pub fn record_transaction(operation: &'static str, outcome: &'static str) {
    metrics::counter!(
        "custody_transactions_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_confirmation_latency(seconds: f64) {
    metrics::histogram!("custody_confirmation_seconds").record(seconds);
}

pub fn record_rpc_retry(call: &'static str) {
    metrics::counter!("custody_rpc_retries_total", "call" => call).increment(1);
}
