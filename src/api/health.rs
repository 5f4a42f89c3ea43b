use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::Result;
use crate::relay::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub device_id: String,
    pub registered: bool,
    pub connection_handle: Option<String>,
    pub active_sockets: usize,
    pub relay: DispatcherStatsSnapshot,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let device_id = state.dispatcher.device_id().to_string();
    let record = state.store.get(&device_id).await?;

    Ok(Json(StatsResponse {
        device_id,
        registered: record.is_some(),
        connection_handle: record.map(|r| r.connection_handle),
        active_sockets: state.transport.active_connections(),
        relay: state.dispatcher.stats(),
    }))
}
