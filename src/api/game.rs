use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::AppState;
use crate::{
    error::Result,
    models::{
        ApiResponse, BuyStepsRequest, EndlessInfoResponse, IdentityResponse, PreparedTxResponse,
        SessionInfoQuery, SessionInfoResponse, SettleRequest, SettleResponse, StartGameRequest,
        StartGameResponse, StepRequest, StepResponse,
    },
};

/// POST /api/v1/game/start
pub async fn start_game(
    State(state): State<AppState>,
    Json(req): Json<StartGameRequest>,
) -> Result<Json<ApiResponse<StartGameResponse>>> {
    let response = state.game.start_game(req).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/v1/game/step
///
/// Dry-run, execute and finality happen inside this request. A rejected
/// step is a successful response with `outcome = rejected`.
pub async fn take_step(
    State(state): State<AppState>,
    Json(req): Json<StepRequest>,
) -> Result<Json<ApiResponse<StepResponse>>> {
    let response = state.game.take_step(req).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/game/session/{identity}?session_key=
pub async fn get_session(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Query(query): Query<SessionInfoQuery>,
) -> Result<Json<ApiResponse<SessionInfoResponse>>> {
    let response = state
        .game
        .get_session_info(&identity, query.session_key.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/game/endless
pub async fn get_endless(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<EndlessInfoResponse>>> {
    let response = state.game.get_endless_info().await?;
    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/v1/game/settle
pub async fn settle_game(
    State(state): State<AppState>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<ApiResponse<SettleResponse>>> {
    let response = state.game.settle_game(req).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/game/identity/{owner}
pub async fn get_identity(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<ApiResponse<IdentityResponse>>> {
    let response = state.game.find_identity(&owner).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/v1/game/buy-steps
pub async fn buy_steps(
    State(state): State<AppState>,
    Json(req): Json<BuyStepsRequest>,
) -> Result<Json<ApiResponse<PreparedTxResponse>>> {
    let response = state.game.buy_steps(req).await?;
    Ok(Json(ApiResponse::success(response)))
}
