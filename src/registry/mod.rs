//! Registry service
//!
//! Drives connection record transitions from transport lifecycle events.
//! Per device the state machine is: unregistered -> registered on connect,
//! registered -> registered (new handle) on a subsequent connect, and
//! registered -> unregistered on a disconnect that still matches the
//! current handle. A disconnect for a superseded handle is ignored.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::store::ConnectionStore;

pub struct RegistryService {
    store: Arc<dyn ConnectionStore>,
}

impl RegistryService {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// Handle a connect event from the transport.
    ///
    /// The record is durably upserted before the connect is acknowledged.
    /// A second connect for the same device overwrites the previous handle
    /// without notifying the old socket; last-connected wins.
    #[tracing::instrument(name = "registry.connect", skip(self))]
    pub async fn connect(&self, device_id: &str, connection_handle: &str) -> Result<()> {
        if device_id.trim().is_empty() {
            return Err(AppError::Validation(
                "Missing device id on connect".to_string(),
            ));
        }

        self.store.put(device_id, connection_handle).await?;

        tracing::info!(
            device_id = %device_id,
            connection_handle = %connection_handle,
            "Connection registered"
        );

        Ok(())
    }

    /// Handle a disconnect event from the transport.
    ///
    /// Only the handle is known at disconnect time; the device id is
    /// recovered through the store's reverse index. Idempotent: a second
    /// disconnect for the same handle is a harmless no-op, as is a late
    /// disconnect for a handle that was already superseded by a reconnect.
    #[tracing::instrument(name = "registry.disconnect", skip(self))]
    pub async fn disconnect(&self, connection_handle: &str) -> Result<()> {
        match self.store.delete_by_handle(connection_handle).await? {
            Some(device_id) => {
                tracing::info!(
                    device_id = %device_id,
                    connection_handle = %connection_handle,
                    "Connection unregistered"
                );
            }
            None => {
                tracing::debug!(
                    connection_handle = %connection_handle,
                    "Disconnect for unknown or superseded handle, ignoring"
                );
            }
        }

        Ok(())
    }
}
