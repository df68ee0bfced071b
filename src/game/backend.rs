use async_trait::async_trait;

use super::session::{GameSessionSnapshot, SessionKey};
use crate::{
    error::Result,
    models::{SettleRequest, SettleResponse, StartGameRequest, StartGameResponse, StepRequest, StepResponse},
};

/// What the client-side controller needs from the game backend. Implemented
/// in-process by `GameService` and over HTTP by `BackendClient`.
#[async_trait]
pub trait GameBackend: Send + Sync {
    async fn start_game(&self, request: StartGameRequest) -> Result<StartGameResponse>;

    async fn take_step(&self, request: StepRequest) -> Result<StepResponse>;

    async fn fetch_session(
        &self,
        identity: &str,
        session_key: &SessionKey,
    ) -> Result<Option<GameSessionSnapshot>>;

    async fn settle_game(&self, request: SettleRequest) -> Result<SettleResponse>;
}
