//! Transport adapter
//!
//! The WebSocket gateway's one outbound primitive: send a payload to a
//! connection handle. The dispatcher talks to this seam only; the live
//! implementation is an in-process map of handle -> per-socket sender fed
//! by the WebSocket handler.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The handle no longer maps to a live socket.
    #[error("Connection '{0}' is gone")]
    Gone(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Push a payload to one connection. "Gone" means the socket already
    /// closed on the far end; the caller decides what that implies.
    async fn send(&self, connection_handle: &str, payload: &str) -> Result<(), TransportError>;
}

/// Live gateway transport: one bounded channel per connected socket.
pub struct GatewayTransport {
    senders: DashMap<String, mpsc::Sender<String>>,
}

impl GatewayTransport {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Attach a live socket's sender under its transport-assigned handle.
    pub fn attach(&self, connection_handle: String, sender: mpsc::Sender<String>) {
        self.senders.insert(connection_handle, sender);
    }

    /// Detach a socket on close. Safe to call more than once.
    pub fn detach(&self, connection_handle: &str) {
        self.senders.remove(connection_handle);
    }

    /// Number of live sockets
    pub fn active_connections(&self) -> usize {
        self.senders.len()
    }
}

impl Default for GatewayTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn send(&self, connection_handle: &str, payload: &str) -> Result<(), TransportError> {
        // Clone the sender out of the map so the shard lock is not held
        // across the await.
        let sender = self
            .senders
            .get(connection_handle)
            .map(|entry| entry.value().clone());

        let Some(sender) = sender else {
            return Err(TransportError::Gone(connection_handle.to_string()));
        };

        sender
            .send(payload.to_string())
            .await
            .map_err(|_| TransportError::Gone(connection_handle.to_string()))
    }
}
