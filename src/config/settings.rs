use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Logical id of the publishing device the relay targets.
    #[serde(default = "default_device_id")]
    pub device_id: String,
    /// Payload pushed when the caller does not supply one.
    #[serde(default = "default_payload")]
    pub default_payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Connection store backend: "memory" or "redis".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Key prefix for the Redis backend.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_device_id() -> String {
    "sattelhof-raspberrypi".to_string()
}

fn default_payload() -> String {
    "hello from birdio!".to_string()
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_key_prefix() -> String {
    "birdio:connections".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("relay.device_id", "sattelhof-raspberrypi")?
            .set_default("relay.default_payload", "hello from birdio!")?
            .set_default("store.backend", "memory")?
            .set_default("store.key_prefix", "birdio:connections")?
            .set_default("redis.url", "redis://localhost:6379")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, RELAY_DEVICE_ID, REDIS_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            default_payload: default_payload(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}
