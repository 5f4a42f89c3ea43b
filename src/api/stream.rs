//! Relay trigger endpoint.

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::error::Result;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Optional payload override; the configured default is used otherwise.
    pub payload: Option<String>,
}

/// GET /stream - push a payload to the device's active connection
///
/// Returns the relayed payload as the body on success, 400 when no
/// connection is registered, 502 when the resolved handle is gone.
#[tracing::instrument(
    name = "http.get_stream",
    skip(state, query),
    fields(has_payload_override = query.payload.is_some())
)]
pub async fn get_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<String> {
    let payload = query
        .payload
        .unwrap_or_else(|| state.settings.relay.default_payload.clone());

    let result = state.dispatcher.dispatch(&payload).await?;

    tracing::debug!(
        device_id = %result.device_id,
        connection_handle = %result.connection_handle,
        "Stream relay completed"
    );

    Ok(payload)
}
