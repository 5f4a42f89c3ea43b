//! In-process connection store backed by dashmap.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ConnectionRecord, ConnectionStore, StoreBackend, StoreError};

/// In-memory connection store with an explicit reverse index.
///
/// Both maps are updated together on every mutation. The reverse index turns
/// the handle-only disconnect into an O(1) lookup.
pub struct MemoryConnectionStore {
    /// device_id -> connection_handle
    by_device: DashMap<String, String>,
    /// connection_handle -> device_id
    by_handle: DashMap<String, String>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self {
            by_device: DashMap::new(),
            by_handle: DashMap::new(),
        }
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.by_device.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }
}

impl Default for MemoryConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn put(&self, device_id: &str, connection_handle: &str) -> Result<(), StoreError> {
        if let Some(old_handle) = self
            .by_device
            .insert(device_id.to_string(), connection_handle.to_string())
        {
            // The superseded handle must no longer resolve to this device,
            // otherwise its late disconnect would clear the new registration.
            if old_handle != connection_handle {
                self.by_handle.remove(&old_handle);
            }
        }
        self.by_handle
            .insert(connection_handle.to_string(), device_id.to_string());

        Ok(())
    }

    async fn get(&self, device_id: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        Ok(self.by_device.get(device_id).map(|handle| ConnectionRecord {
            device_id: device_id.to_string(),
            connection_handle: handle.clone(),
        }))
    }

    async fn delete_by_handle(&self, connection_handle: &str) -> Result<Option<String>, StoreError> {
        let Some((_, device_id)) = self.by_handle.remove(connection_handle) else {
            return Ok(None);
        };

        // Guard against a concurrent re-registration between the two map
        // operations: only clear the primary entry if it still holds this
        // handle.
        self.by_device
            .remove_if(&device_id, |_, handle| handle.as_str() == connection_handle);

        Ok(Some(device_id))
    }
}
