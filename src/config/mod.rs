mod settings;

pub use settings::{RedisConfig, RelayConfig, ServerConfig, Settings, StoreConfig};
