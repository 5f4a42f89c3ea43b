use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::{WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION};
use crate::server::AppState;

const CHANNEL_BUFFER_SIZE: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub id: Option<String>,
}

/// WebSocket upgrade handler
///
/// The publishing device opens `/ws?id=<device-id>`; the device id arrives
/// as a query parameter at socket-open time, the connection handle is
/// assigned here. A missing id rejects the upgrade with a client error.
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, query),
    fields(has_device_id = query.id.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let device_id = match query.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            tracing::warn!("WebSocket upgrade rejected: missing device id");
            return (StatusCode::BAD_REQUEST, "Missing device id").into_response();
        }
    };

    tracing::info!(device_id = %device_id, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, device_id))
}

/// Handle an established WebSocket connection
#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state),
    fields(device_id = %device_id)
)]
async fn handle_socket(socket: WebSocket, state: AppState, device_id: String) {
    let connection_handle = Uuid::new_v4().to_string();
    let connection_start = std::time::Instant::now();

    // Create channel for pushing relayed payloads to this connection
    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_BUFFER_SIZE);

    // The sender must be reachable before the registration lands, otherwise
    // a relay racing the connect could resolve a handle with no socket.
    state.transport.attach(connection_handle.clone(), tx);

    // Durably register before the connect is acknowledged
    if let Err(e) = state.registry.connect(&device_id, &connection_handle).await {
        tracing::error!(
            device_id = %device_id,
            connection_handle = %connection_handle,
            error = %e,
            "Failed to register connection"
        );
        state.transport.detach(&connection_handle);
        let (mut ws_sender, _) = socket.split();
        let _ = ws_sender.close().await;
        return;
    }

    WS_CONNECTIONS_OPENED.inc();

    tracing::info!(
        device_id = %device_id,
        connection_handle = %connection_handle,
        "WebSocket connection established"
    );

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for forwarding relayed payloads to the socket
    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Task for draining inbound frames. The publisher sends nothing the
    // relay acts on; frames are consumed to keep the socket healthy and to
    // detect closure.
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_handle = %connection_handle, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_handle = %connection_handle, "Receive task completed");
        }
    }

    // The handle stops resolving first, then the registration is cleared.
    state.transport.detach(&connection_handle);
    if let Err(e) = state.registry.disconnect(&connection_handle).await {
        tracing::warn!(
            connection_handle = %connection_handle,
            error = %e,
            "Failed to clear registration on disconnect"
        );
    }

    WS_CONNECTIONS_CLOSED.inc();
    let duration = connection_start.elapsed().as_secs_f64();
    WS_CONNECTION_DURATION.observe(duration);

    tracing::info!(
        device_id = %device_id,
        connection_handle = %connection_handle,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}
