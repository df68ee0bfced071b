// src/api/mod.rs
pub mod game;
pub mod health;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, services::game_service::GameService};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub game: Arc<GameService>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Game
        .route("/api/v1/game/start", post(game::start_game))
        .route("/api/v1/game/step", post(game::take_step))
        .route("/api/v1/game/session/{identity}", get(game::get_session))
        .route("/api/v1/game/endless", get(game::get_endless))
        .route("/api/v1/game/settle", post(game::settle_game))
        .route("/api/v1/game/identity/{owner}", get(game::get_identity))
        .route("/api/v1/game/buy-steps", post(game::buy_steps))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
