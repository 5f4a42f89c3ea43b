use std::sync::Arc;

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::redis::RedisPool;
use crate::registry::RegistryService;
use crate::relay::RelayDispatcher;
use crate::store::{create_connection_store, ConnectionStore};
use crate::transport::{GatewayTransport, Transport};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn ConnectionStore>,
    pub registry: Arc<RegistryService>,
    pub transport: Arc<GatewayTransport>,
    pub dispatcher: Arc<RelayDispatcher>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        // The store and transport clients are built once and shared by
        // every unit of work; handlers never construct their own.
        let redis_pool = match settings.store.backend.as_str() {
            "redis" => Some(Arc::new(RedisPool::new(&settings.redis).map_err(|e| {
                AppError::Internal(format!("Failed to initialize Redis pool: {}", e))
            })?)),
            _ => None,
        };

        let store = create_connection_store(&settings.store, redis_pool);
        let registry = Arc::new(RegistryService::new(store.clone()));
        let transport = Arc::new(GatewayTransport::new());
        let dispatcher = Arc::new(RelayDispatcher::new(
            store.clone(),
            transport.clone() as Arc<dyn Transport>,
            settings.relay.device_id.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            store,
            registry,
            transport,
            dispatcher,
        })
    }
}
