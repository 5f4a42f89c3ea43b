//! Relay dispatcher
//!
//! Answers "push this payload to the device's current connection". Resolves
//! the device through the connection store and performs exactly one
//! transport send: fire-and-forget, at-most-once, no retry and no queuing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::metrics::{RelayMetrics, RELAY_SEND_DURATION};
use crate::store::ConnectionStore;
use crate::transport::{Transport, TransportError};

/// Result of a successful relay dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub device_id: String,
    pub connection_handle: String,
    pub delivered_at: DateTime<Utc>,
}

/// Counters for the relay dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Payloads accepted by the transport
    pub relayed: AtomicU64,
    /// Requests that found no registration
    pub no_connection: AtomicU64,
    /// Requests whose resolved handle was gone
    pub delivery_failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            relayed: self.relayed.load(Ordering::Relaxed),
            no_connection: self.no_connection.load(Ordering::Relaxed),
            delivery_failed: self.delivery_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub relayed: u64,
    pub no_connection: u64,
    pub delivery_failed: u64,
}

/// Dispatches payloads to the configured device's live connection
pub struct RelayDispatcher {
    store: Arc<dyn ConnectionStore>,
    transport: Arc<dyn Transport>,
    device_id: String,
    stats: DispatcherStats,
}

impl RelayDispatcher {
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        transport: Arc<dyn Transport>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            device_id: device_id.into(),
            stats: DispatcherStats::default(),
        }
    }

    /// The device id this dispatcher targets
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve the device's current handle and push one payload to it.
    ///
    /// Absence of a registration and a stale handle are reported as two
    /// distinct errors: the first means the device never connected or
    /// cleanly disconnected, the second means a ghost record whose socket
    /// dropped without a disconnect event. The record is not cleaned up on
    /// delivery failure; the handle stays authoritative until the registry
    /// says otherwise.
    #[tracing::instrument(
        name = "relay.dispatch",
        skip(self, payload),
        fields(device_id = %self.device_id, payload_len = payload.len())
    )]
    pub async fn dispatch(&self, payload: &str) -> Result<DeliveryResult> {
        let record = self.store.get(&self.device_id).await?;

        let Some(record) = record else {
            self.stats.no_connection.fetch_add(1, Ordering::Relaxed);
            RelayMetrics::record_no_connection();
            tracing::debug!(
                device_id = %self.device_id,
                "Relay requested but no connection is registered"
            );
            return Err(AppError::NoActiveConnection(self.device_id.clone()));
        };

        let timer = RELAY_SEND_DURATION.start_timer();
        let sent = self
            .transport
            .send(&record.connection_handle, payload)
            .await;
        timer.observe_duration();

        match sent {
            Ok(()) => {
                self.stats.relayed.fetch_add(1, Ordering::Relaxed);
                RelayMetrics::record_delivered();

                tracing::info!(
                    device_id = %self.device_id,
                    connection_handle = %record.connection_handle,
                    "Payload relayed"
                );

                Ok(DeliveryResult {
                    device_id: record.device_id,
                    connection_handle: record.connection_handle,
                    delivered_at: Utc::now(),
                })
            }
            Err(TransportError::Gone(handle)) => {
                self.stats.delivery_failed.fetch_add(1, Ordering::Relaxed);
                RelayMetrics::record_delivery_failed();

                tracing::warn!(
                    device_id = %self.device_id,
                    connection_handle = %handle,
                    "Resolved handle is no longer live; registration left in place"
                );

                Err(AppError::Delivery(format!(
                    "Connection '{}' is gone",
                    handle
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = DispatcherStats::default();
        stats.relayed.fetch_add(3, Ordering::Relaxed);
        stats.no_connection.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.relayed, 3);
        assert_eq!(snapshot.no_connection, 1);
        assert_eq!(snapshot.delivery_failed, 0);
    }
}
