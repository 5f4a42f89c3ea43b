//! Redis-backed durable connection store.
//!
//! Layout: `{prefix}:device:{id}` holds the current handle and
//! `{prefix}:handle:{h}` holds the owning device id. The two keys are
//! written together in a pipeline so the reverse index never outlives a
//! registration by more than one in-flight operation.

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::redis::RedisPool;

use super::{ConnectionRecord, ConnectionStore, StoreBackend, StoreError};

pub struct RedisConnectionStore {
    pool: Arc<RedisPool>,
    key_prefix: String,
}

impl RedisConnectionStore {
    pub fn new(pool: Arc<RedisPool>, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
        }
    }

    fn device_key(&self, device_id: &str) -> String {
        format!("{}:device:{}", self.key_prefix, device_id)
    }

    fn handle_key(&self, connection_handle: &str) -> String {
        format!("{}:handle:{}", self.key_prefix, connection_handle)
    }
}

#[async_trait]
impl ConnectionStore for RedisConnectionStore {
    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Redis
    }

    async fn put(&self, device_id: &str, connection_handle: &str) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .get_connection()
            .await
            .map_err(|e| StoreError::Redis(format!("Failed to get connection: {}", e)))?;

        let previous: Option<String> = conn
            .get(&self.device_key(device_id))
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        let mut pipe = redis::pipe();
        pipe
            // Store the current handle for the device
            .cmd("SET")
            .arg(&self.device_key(device_id))
            .arg(connection_handle)
            // Maintain the reverse index for handle-only disconnects
            .cmd("SET")
            .arg(&self.handle_key(connection_handle))
            .arg(device_id);

        // A superseded handle must stop resolving to this device
        if let Some(old) = previous.filter(|old| old != connection_handle) {
            pipe.cmd("DEL").arg(&self.handle_key(&old));
        }

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        tracing::debug!(
            device_id = %device_id,
            connection_handle = %connection_handle,
            "Registration stored"
        );

        Ok(())
    }

    async fn get(&self, device_id: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        let mut conn = self
            .pool
            .get_connection()
            .await
            .map_err(|e| StoreError::Redis(format!("Failed to get connection: {}", e)))?;

        let handle: Option<String> = conn
            .get(&self.device_key(device_id))
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        Ok(handle.map(|connection_handle| ConnectionRecord {
            device_id: device_id.to_string(),
            connection_handle,
        }))
    }

    async fn delete_by_handle(&self, connection_handle: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self
            .pool
            .get_connection()
            .await
            .map_err(|e| StoreError::Redis(format!("Failed to get connection: {}", e)))?;

        let device_id: Option<String> = conn
            .get(&self.handle_key(connection_handle))
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        let Some(device_id) = device_id else {
            // Already deleted, or never the canonical holder: a no-op
            return Ok(None);
        };

        let current: Option<String> = conn
            .get(&self.device_key(&device_id))
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        if current.as_deref() == Some(connection_handle) {
            let _: () = redis::pipe()
                .cmd("DEL")
                .arg(&self.device_key(&device_id))
                .cmd("DEL")
                .arg(&self.handle_key(connection_handle))
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Redis(e.to_string()))?;

            tracing::debug!(
                device_id = %device_id,
                connection_handle = %connection_handle,
                "Registration deleted"
            );

            Ok(Some(device_id))
        } else {
            // The device re-registered under a newer handle; drop only the
            // stale reverse entry and leave the registration intact.
            let _: () = conn
                .del(&self.handle_key(connection_handle))
                .await
                .map_err(|e| StoreError::Redis(e.to_string()))?;

            Ok(None)
        }
    }
}
