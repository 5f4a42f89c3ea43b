// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;

// Domain layer (business logic)
pub mod registry;
pub mod relay;
pub mod store;
pub mod transport;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;
