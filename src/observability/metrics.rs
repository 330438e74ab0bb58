//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_connections_total` (counter): accepted connections, by `secure`
//! - `rpc_active_connections` (gauge): sessions currently running
//! - `rpc_messages_total` (counter): processed messages, by `method`
//! - `rpc_process_duration_seconds` (histogram): processor latency, by `method`
//! - `rpc_session_errors_total` (counter): sessions ended by an error, by `kind`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_opened(secure: bool) {
    ::metrics::counter!("rpc_connections_total", "secure" => secure.to_string()).increment(1);
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!("rpc_active_connections").set(count as f64);
}

pub fn record_message(method: &str, started: Instant) {
    let method = method.to_string();
    ::metrics::counter!("rpc_messages_total", "method" => method.clone()).increment(1);
    ::metrics::histogram!("rpc_process_duration_seconds", "method" => method)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_session_error(kind: &'static str) {
    ::metrics::counter!("rpc_session_errors_total", "kind" => kind).increment(1);
}
