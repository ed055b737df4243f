use crate::AppState;
use crate::registry::RegistryCommand;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub connections: usize,
    pub waiting: usize,
    pub active_rooms: usize,
}

/// Read-only liveness probe: current session, pool and room counts.
pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthReport>, StatusCode> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .registry_tx
        .send(RegistryCommand::Stats { reply: reply_tx })
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let stats = reply_rx
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthReport {
        status: "ok",
        connections: stats.sessions,
        waiting: stats.waiting,
        active_rooms: stats.rooms,
    }))
}
