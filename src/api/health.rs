use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: String,
    pub chain: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // The endless singleton is always there, so reading it checks the node.
    let chain_status = match state.game.get_endless_info().await {
        Ok(_) => "connected".to_string(),
        Err(e) if e.is_transport() => "unreachable".to_string(),
        Err(_) => "degraded".to_string(),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.config.network.as_str().to_string(),
        chain: chain_status,
    })
}
