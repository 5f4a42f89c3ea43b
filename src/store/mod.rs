//! Durable connection store
//!
//! Maps a logical device id to the connection handle of its current live
//! socket. The device id is the primary key; because disconnect events only
//! carry the handle, every backend also maintains an explicit reverse index
//! (handle -> device id) so that cleanup is a point lookup instead of a scan.

mod memory;
mod redis;

pub use memory::MemoryConnectionStore;
pub use self::redis::RedisConnectionStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::redis::RedisPool;

/// Current registration for one device. Only the latest handle is kept; a
/// reconnect overwrites, it never duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub device_id: String,
    pub connection_handle: String,
}

/// Error type for connection store operations.
///
/// A lookup miss is not an error; this type only covers the store itself
/// being unreachable or rejecting an operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(String),
}

/// Backend type for the connection store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store (single instance deployments)
    Memory,
    /// Redis-backed durable store
    Redis,
}

/// Trait for durable connection registrations
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Get the backend type
    fn backend_type(&self) -> StoreBackend;

    /// Upsert the record for a device. Unconditional overwrite; a previous
    /// handle for the same device is abandoned (last writer wins).
    async fn put(&self, device_id: &str, connection_handle: &str) -> Result<(), StoreError>;

    /// Point lookup by device id. `None` is a normal outcome: no publisher
    /// has ever connected, or it cleanly disconnected.
    async fn get(&self, device_id: &str) -> Result<Option<ConnectionRecord>, StoreError>;

    /// Remove whichever record currently holds this handle and return the
    /// device id it was registered under. A handle that matches nothing, or
    /// that was superseded by a newer registration, is a no-op (`None`).
    async fn delete_by_handle(&self, connection_handle: &str) -> Result<Option<String>, StoreError>;
}

/// Create a connection store based on configuration
pub fn create_connection_store(
    config: &StoreConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn ConnectionStore> {
    match config.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    key_prefix = %config.key_prefix,
                    "Creating Redis connection store"
                );
                Arc::new(RedisConnectionStore::new(pool, config.key_prefix.clone()))
            } else {
                tracing::warn!(
                    "Redis store configured but pool not available, falling back to in-memory store"
                );
                Arc::new(MemoryConnectionStore::new())
            }
        }
        _ => {
            tracing::info!("Using in-memory connection store");
            Arc::new(MemoryConnectionStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_store() {
        let config = StoreConfig::default();
        let store = create_connection_store(&config, None);
        assert_eq!(store.backend_type(), StoreBackend::Memory);
    }

    #[test]
    fn test_redis_without_pool_falls_back_to_memory() {
        let config = StoreConfig {
            backend: "redis".to_string(),
            ..Default::default()
        };
        let store = create_connection_store(&config, None);
        assert_eq!(store.backend_type(), StoreBackend::Memory);
    }

    #[test]
    fn test_record_serialization() {
        let record = ConnectionRecord {
            device_id: "sattelhof-raspberrypi".to_string(),
            connection_handle: "conn-1".to_string(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ConnectionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
