use async_trait::async_trait;
use std::sync::Arc;

use super::{game_info::GameInfoFetcher, step_resolver::StepResolver};
use crate::{
    chain::{
        rpc_client::JsonRpcChainClient,
        transaction::{StakePayment, UnsignedTx},
        ChainRpc, ExecutionStatus,
    },
    config::Config,
    error::{AppError, Result},
    game::{
        attempt::StepAttempt,
        backend::GameBackend,
        session::{GameSessionSnapshot, SessionKey, SessionState},
        session_key::generate_session_key,
        transactions::{
            build_buy_steps_tx, build_settle_tx, build_start_tx, build_step_tx, StepTxParams,
        },
    },
    models::{
        BuyStepsRequest, EndlessInfoResponse, IdentityResponse, PreparedTxResponse,
        SessionInfoResponse, SettleRequest, SettleResponse, StartGameRequest, StartGameResponse,
        StepRequest, StepResponse,
    },
};

const MAX_DIGEST_LEN: usize = 128;

/// Backend side of the game RPC surface.
pub struct GameService {
    config: Config,
    chain: Arc<dyn ChainRpc>,
    resolver: StepResolver,
    fetcher: GameInfoFetcher,
    sender: String,
}

impl GameService {
    pub fn new(config: &Config, chain: Arc<dyn ChainRpc>, sender: String) -> Self {
        Self {
            resolver: StepResolver::new(chain.clone(), config.lane_count),
            fetcher: GameInfoFetcher::new(
                chain.clone(),
                config.objects.clone(),
                config.max_scan_pages,
            ),
            config: config.clone(),
            chain,
            sender,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = JsonRpcChainClient::from_config(config)?;
        let sender = client.sender_address().to_string();
        tracing::info!("Backend signer address: {}", sender);
        Ok(Self::new(config, Arc::new(client), sender))
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub async fn start_game(&self, req: StartGameRequest) -> Result<StartGameResponse> {
        let owner = required(&req.owner, "owner")?;

        if let Some(digest) = normalize_tx_digest(req.onchain_tx_digest.as_deref())? {
            let session_key = match req.session_key.as_deref() {
                Some(raw) => SessionKey::parse(raw)?,
                None => {
                    return Err(AppError::BadRequest(
                        "session_key is required with onchain_tx_digest".to_string(),
                    ))
                }
            };
            self.chain.wait_for_finality(&digest).await?;
            tracing::info!("Start game {} for {} finalized", digest, owner);
            return Ok(StartGameResponse {
                session_key,
                identity: req.identity,
                tx_digest: Some(digest),
                requires_wallet_signature: false,
                prepared_tx: None,
            });
        }

        let identity = match req.identity.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(identity) => Some(identity.to_string()),
            None => self.fetcher.find_identity_token(owner).await?,
        };
        let session_key = generate_session_key(owner)?;
        let stake = StakePayment {
            amount: req.stake_amount.unwrap_or(self.config.start_stake),
            coin_type: self.config.objects.stake_coin_type(),
            coin: req.stake_coin.clone(),
        };
        let backend_pays = self.config.backend_submit && identity.is_some() && stake.coin.is_some();

        let signer = if backend_pays { self.sender.as_str() } else { owner };
        let tx = build_start_tx(
            &self.config.objects,
            identity.as_deref(),
            &session_key,
            stake,
            signer,
            self.config.gas_budget,
        )?;
        let session_key = SessionKey::Keyed(session_key);

        if !backend_pays {
            tracing::debug!("Prepared start game for {} (wallet signature required)", owner);
            return Ok(StartGameResponse {
                session_key,
                identity,
                tx_digest: None,
                requires_wallet_signature: true,
                prepared_tx: Some(tx),
            });
        }

        let digest = self.submit(&tx, "start game").await?;
        tracing::info!("Started game {} for {} in {}", session_key, owner, digest);
        Ok(StartGameResponse {
            session_key,
            identity,
            tx_digest: Some(digest),
            requires_wallet_signature: false,
            prepared_tx: None,
        })
    }

    pub async fn take_step(&self, req: StepRequest) -> Result<StepResponse> {
        let tx = build_step_tx(
            &self.config.objects,
            StepTxParams {
                identity: req.identity.trim(),
                session_key: &req.session_key,
                chosen_index: req.chosen_index,
                lane_count: self.config.lane_count,
                payout_recipient: req.payout_recipient.trim(),
                sender: &self.sender,
                gas_budget: self.config.gas_budget,
            },
        )?;
        let attempt = StepAttempt::new(req.chosen_index);
        let attempt_id = attempt.id();
        let resolved = self.resolver.resolve_step(attempt, &tx).await?;
        tracing::info!(
            "Step {} for {} on {} lane {}: {}",
            attempt_id,
            req.identity,
            req.session_key,
            req.chosen_index,
            resolved.outcome().label()
        );
        Ok(StepResponse::from_attempt(&resolved))
    }

    pub async fn get_session_info(
        &self,
        identity: &str,
        session_key: Option<&str>,
    ) -> Result<SessionInfoResponse> {
        let key = session_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(SessionKey::parse)
            .transpose()?;

        let account = match &key {
            Some(SessionKey::Endless { .. }) => None,
            _ => self.fetcher.fetch_account(identity).await?,
        };
        let session = match &key {
            Some(SessionKey::Endless { .. }) => Some(self.fetcher.fetch_endless_session().await?),
            Some(key) => account.as_ref().and_then(|a| a.game(key).cloned()),
            None => account.as_ref().and_then(|a| a.games.last().cloned()),
        };
        let (steps, games) = account.map(|a| (a.steps, a.games)).unwrap_or_default();

        Ok(SessionInfoResponse {
            identity: identity.trim().to_string(),
            state: session
                .as_ref()
                .map(GameSessionSnapshot::state)
                .unwrap_or(SessionState::Ready),
            session,
            steps,
            games,
        })
    }

    pub async fn get_endless_info(&self) -> Result<EndlessInfoResponse> {
        let session = self.fetcher.fetch_endless_session().await?;
        Ok(EndlessInfoResponse {
            state: session.state(),
            session,
        })
    }

    pub async fn settle_game(&self, req: SettleRequest) -> Result<SettleResponse> {
        let identity = required(&req.identity, "identity")?;
        let owner = required(&req.owner, "owner")?;

        if let Some(digest) = normalize_tx_digest(req.onchain_tx_digest.as_deref())? {
            self.chain.wait_for_finality(&digest).await?;
            tracing::info!("Settlement {} for {} finalized", digest, identity);
            return Ok(SettleResponse {
                success: true,
                tx_digest: Some(digest),
                requires_wallet_signature: false,
                prepared_tx: None,
            });
        }

        if self.fetcher.fetch_account(identity).await?.is_none() {
            return Err(AppError::NoActiveSession(identity.to_string()));
        }

        // clear_user_info takes the identity token by reference, and only
        // its owner can pass it. The backend key never settles.
        let tx = build_settle_tx(&self.config.objects, identity, owner, self.config.gas_budget)?;
        tracing::debug!("Prepared settlement of {} for {}", identity, owner);
        Ok(SettleResponse {
            success: false,
            tx_digest: None,
            requires_wallet_signature: true,
            prepared_tx: Some(tx),
        })
    }

    pub async fn find_identity(&self, owner: &str) -> Result<IdentityResponse> {
        let identity = self.fetcher.find_identity_token(owner).await?;
        Ok(IdentityResponse {
            owner: owner.trim().to_string(),
            identity,
        })
    }

    pub async fn buy_steps(&self, req: BuyStepsRequest) -> Result<PreparedTxResponse> {
        let owner = required(&req.owner, "owner")?;
        let stake = StakePayment {
            amount: req.amount,
            coin_type: self.config.objects.stake_coin_type(),
            coin: req.stake_coin,
        };
        let tx = build_buy_steps_tx(
            &self.config.objects,
            req.identity.trim(),
            stake,
            owner,
            self.config.gas_budget,
        )?;
        Ok(PreparedTxResponse {
            requires_wallet_signature: true,
            prepared_tx: tx,
        })
    }

    /// Simulates, executes and waits for finality of a backend-signed tx.
    async fn submit(&self, tx: &UnsignedTx, what: &str) -> Result<String> {
        let dry_run = self.chain.dry_run(tx).await?;
        if let ExecutionStatus::Failure(reason) = dry_run.status {
            return Err(AppError::BadRequest(format!("{} rejected: {}", what, reason)));
        }
        let executed = self.chain.execute(tx).await?;
        if let ExecutionStatus::Failure(reason) = executed.status {
            return Err(AppError::BadRequest(format!(
                "{} failed on chain ({}): {}",
                what, executed.digest, reason
            )));
        }
        self.chain.wait_for_finality(&executed.digest).await?;
        Ok(executed.digest)
    }
}

#[async_trait]
impl GameBackend for GameService {
    async fn start_game(&self, request: StartGameRequest) -> Result<StartGameResponse> {
        GameService::start_game(self, request).await
    }

    async fn take_step(&self, request: StepRequest) -> Result<StepResponse> {
        GameService::take_step(self, request).await
    }

    async fn fetch_session(
        &self,
        identity: &str,
        session_key: &SessionKey,
    ) -> Result<Option<GameSessionSnapshot>> {
        self.fetcher.fetch_session(identity, session_key).await
    }

    async fn settle_game(&self, request: SettleRequest) -> Result<SettleResponse> {
        GameService::settle_game(self, request).await
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", what)));
    }
    Ok(trimmed)
}

fn normalize_tx_digest(digest: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = digest.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if raw.len() > MAX_DIGEST_LEN {
        return Err(AppError::BadRequest(format!(
            "onchain_tx_digest exceeds maximum length ({})",
            MAX_DIGEST_LEN
        )));
    }
    if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(
            "onchain_tx_digest must be base58 or hex".to_string(),
        ));
    }
    Ok(Some(raw.to_string()))
}
