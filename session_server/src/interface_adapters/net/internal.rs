use crate::interface_adapters::state::AppState;

use axum::{Json, extract::State};
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    // Rooms currently alive in the registry.
    pub rooms: usize,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: state.registry.room_count().await,
    })
}
