//! Prometheus metrics for the relay service.
//!
//! - Connection metrics (opened, closed, currently active)
//! - Relay metrics (outcome counts, send latency)

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "birdio";

lazy_static! {
    /// Total WebSocket connections opened since start
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total number of WebSocket connections opened"
    ).unwrap();

    /// Total WebSocket connections closed since start
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total number of WebSocket connections closed"
    ).unwrap();

    /// Currently active WebSocket connections
    pub static ref WS_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_ws_connections_active", METRIC_PREFIX),
        "Number of currently active WebSocket connections"
    ).unwrap();

    /// Connection lifetime in seconds
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 21600.0]
    ).unwrap();

    /// Relay requests by outcome
    pub static ref RELAY_REQUESTS: IntCounterVec = register_int_counter_vec!(
        format!("{}_relay_requests_total", METRIC_PREFIX),
        "Relay requests by outcome",
        &["outcome"]
    ).unwrap();

    /// Latency of the transport send
    pub static ref RELAY_SEND_DURATION: Histogram = register_histogram!(
        format!("{}_relay_send_duration_seconds", METRIC_PREFIX),
        "Duration of the transport send in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording relay outcomes
pub struct RelayMetrics;

impl RelayMetrics {
    pub fn record_delivered() {
        RELAY_REQUESTS.with_label_values(&["delivered"]).inc();
    }

    pub fn record_no_connection() {
        RELAY_REQUESTS.with_label_values(&["no_connection"]).inc();
    }

    pub fn record_delivery_failed() {
        RELAY_REQUESTS.with_label_values(&["delivery_failed"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        RelayMetrics::record_delivered();
        let output = encode_metrics().unwrap();
        assert!(output.contains("birdio_relay_requests_total"));
    }
}
