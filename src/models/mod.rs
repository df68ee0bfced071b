// src/models/mod.rs
pub mod game;

use serde::{Deserialize, Serialize};

pub use game::{
    BuyStepsRequest, EndlessInfoResponse, IdentityResponse, PreparedTxResponse,
    SessionInfoQuery, SessionInfoResponse, SettleRequest, SettleResponse, StartGameRequest,
    StartGameResponse, StepRequest, StepResponse,
};

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
