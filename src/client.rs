//! HTTP client for the game API, so a controller can run against a remote
//! backend instead of an in-process `GameService`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::{
    error::{AppError, ErrorResponse, Result},
    game::{
        backend::GameBackend,
        session::{GameSessionSnapshot, SessionKey},
    },
    models::{
        ApiResponse, SessionInfoResponse, SettleRequest, SettleResponse, StartGameRequest,
        StartGameResponse, StepRequest, StepResponse,
    },
};

/// Finality waits happen inside step requests, so allow for them.
const REQUEST_TIMEOUT_SECS: u64 = 90;

pub struct BackendClient {
    base_url: url::Url,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL {}: {}", base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Config(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(&self, url: url::Url) -> Result<T> {
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;
        if status.is_success() {
            let envelope: ApiResponse<T> = serde_json::from_slice(&body)
                .map_err(|e| AppError::Decode(format!("Unexpected backend payload: {}", e)))?;
            return Ok(envelope.data);
        }
        match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(error) => Err(error.error.into_app_error()),
            // Proxies and load balancers answer without our envelope.
            Err(_) if status.is_server_error() => Err(AppError::Transport(format!(
                "backend answered {}",
                status
            ))),
            Err(_) => Err(AppError::Internal(format!(
                "backend answered {} without an error body",
                status
            ))),
        }
    }

    pub async fn session_info(
        &self,
        identity: &str,
        session_key: Option<&SessionKey>,
    ) -> Result<SessionInfoResponse> {
        let mut url = self.endpoint(&format!("api/v1/game/session/{}", identity.trim()))?;
        if let Some(key) = session_key {
            url.query_pairs_mut().append_pair("session_key", &key.wire());
        }
        self.get(url).await
    }
}

#[async_trait]
impl GameBackend for BackendClient {
    async fn start_game(&self, request: StartGameRequest) -> Result<StartGameResponse> {
        self.post("api/v1/game/start", &request).await
    }

    async fn take_step(&self, request: StepRequest) -> Result<StepResponse> {
        self.post("api/v1/game/step", &request).await
    }

    async fn fetch_session(
        &self,
        identity: &str,
        session_key: &SessionKey,
    ) -> Result<Option<GameSessionSnapshot>> {
        let info = self.session_info(identity, Some(session_key)).await?;
        Ok(info.session)
    }

    async fn settle_game(&self, request: SettleRequest) -> Result<SettleResponse> {
        self.post("api/v1/game/settle", &request).await
    }
}
