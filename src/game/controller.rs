//! Client-side game state machine. One controller owns one session, its
//! board and at most one in-flight step.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::{
    task::JoinHandle,
    time::{timeout, Duration},
};

use super::{
    attempt::{StepAttempt, StepOutcome},
    backend::GameBackend,
    board::Board,
    reconcile::{estimate_step_award, DesyncDetected, ReconcileStep, Reconciled, Reconciler},
    session::{GameSession, GameSessionSnapshot, SessionKey, SessionState},
};
use crate::{
    config::env_parse,
    constants::{
        DEFAULT_DISPLAY_TIMEOUT_MS, DEFAULT_LANE_COUNT, DEFAULT_RECONCILE_GRACE_POLLS,
        DEFAULT_RECONCILE_GRACE_SECS, DEFAULT_SESSION_POLL_INTERVAL_MS,
    },
    error::{AppError, Result},
    models::{SettleRequest, SettleResponse, StartGameRequest, StartGameResponse, StepRequest, StepResponse},
};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub lane_count: u8,
    pub poll_interval: Duration,
    pub grace_polls: u32,
    pub grace_window: chrono::Duration,
    /// How long `finish_step` waits before reporting `StillPending`.
    pub display_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lane_count: DEFAULT_LANE_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_SESSION_POLL_INTERVAL_MS),
            grace_polls: DEFAULT_RECONCILE_GRACE_POLLS,
            grace_window: chrono::Duration::seconds(DEFAULT_RECONCILE_GRACE_SECS),
            display_timeout: Duration::from_millis(DEFAULT_DISPLAY_TIMEOUT_MS),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            lane_count: env_parse("LANE_COUNT", DEFAULT_LANE_COUNT)?,
            poll_interval: Duration::from_millis(env_parse(
                "SESSION_POLL_INTERVAL_MS",
                DEFAULT_SESSION_POLL_INTERVAL_MS,
            )?),
            grace_polls: env_parse("RECONCILE_GRACE_POLLS", DEFAULT_RECONCILE_GRACE_POLLS)?,
            grace_window: chrono::Duration::seconds(env_parse(
                "RECONCILE_GRACE_SECS",
                DEFAULT_RECONCILE_GRACE_SECS,
            )?),
            display_timeout: Duration::from_millis(env_parse(
                "DISPLAY_TIMEOUT_MS",
                DEFAULT_DISPLAY_TIMEOUT_MS,
            )?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MachinePhase {
    Ready,
    Running,
    ResolvedWin,
    ResolvedTrap,
}

/// Transition report handed to the rendering layer. The outcome is final by
/// the time a report exists; only the reveal animation may lag behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepReport {
    Advanced {
        attempt: StepAttempt,
        position: u64,
        award: Option<u64>,
    },
    Won {
        attempt: StepAttempt,
        position: u64,
        award: Option<u64>,
    },
    Trapped {
        attempt: StepAttempt,
        trap_tile: u64,
    },
    /// Could not resolve, please retry. Nothing changed locally.
    Rejected { attempt: StepAttempt },
    /// The display timed out; the resolution keeps running in the background.
    StillPending { attempt_id: u64 },
}

/// Result of feeding one authoritative observation to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    /// A step is in flight; the observation may predate it.
    Deferred,
    InSync,
    Rebuilt(DesyncDetected),
    AwaitingVisibility { misses: u32 },
    SessionReset,
    Idle,
}

struct PendingStep {
    attempt: StepAttempt,
    handle: JoinHandle<Result<StepResponse>>,
}

pub struct GameController {
    backend: Arc<dyn GameBackend>,
    config: ControllerConfig,
    /// Player address; signs wallet transactions and receives payouts.
    owner: String,
    session: GameSession,
    board: Board,
    phase: MachinePhase,
    pending: Option<PendingStep>,
    reconciler: Reconciler,
    last_desync: Option<DesyncDetected>,
    /// Set when a step ended without a known outcome; cleared by the next
    /// successful fetch. No new step is dispatched while it is set.
    needs_reconcile: bool,
}

impl GameController {
    pub fn new(
        backend: Arc<dyn GameBackend>,
        config: ControllerConfig,
        owner: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        let reconciler = Reconciler::new(config.grace_polls, config.grace_window);
        Self {
            backend,
            config,
            owner: owner.into(),
            session: GameSession::ready(identity, SessionKey::Endless { row: 0 }),
            board: Board::empty(),
            phase: MachinePhase::Ready,
            pending: None,
            reconciler,
            last_desync: None,
            needs_reconcile: false,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> MachinePhase {
        self.phase
    }

    pub fn has_pending_step(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_desync(&self) -> Option<&DesyncDetected> {
        self.last_desync.as_ref()
    }

    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }

    /// Starts a new keyed session. When the backend hands back a prepared
    /// transaction the local state is left alone; call `resume` once the
    /// wallet has submitted it.
    pub async fn start(&mut self, stake_coin: Option<String>) -> Result<StartGameResponse> {
        self.ensure_idle()?;
        if matches!(self.phase, MachinePhase::ResolvedWin | MachinePhase::ResolvedTrap) {
            return Err(AppError::SessionResolved);
        }
        if self.session.state == SessionState::Running {
            return Err(AppError::BadRequest(format!(
                "Session {} is still running",
                self.session.session_key
            )));
        }

        let identity = Some(self.session.identity.clone()).filter(|id| !id.is_empty());
        let response = self
            .backend
            .start_game(StartGameRequest {
                owner: self.owner.clone(),
                identity,
                stake_coin,
                ..Default::default()
            })
            .await?;

        if !response.requires_wallet_signature {
            let identity = response
                .identity
                .clone()
                .unwrap_or_else(|| self.session.identity.clone());
            self.resume(identity, response.session_key.clone()).await?;
        }
        Ok(response)
    }

    /// Adopts an existing session, e.g. after a wallet-submitted start or a
    /// reload on another device.
    pub async fn resume(&mut self, identity: String, session_key: SessionKey) -> Result<()> {
        self.ensure_idle()?;
        let snapshot = self.backend.fetch_session(&identity, &session_key).await?;
        self.session = match &snapshot {
            Some(snapshot) => GameSession::from_snapshot(identity, snapshot),
            // Not indexed yet; the grace window covers the gap.
            None => GameSession {
                state: SessionState::Running,
                ..GameSession::ready(identity, session_key)
            },
        };
        self.board = Board::for_session(&self.session);
        self.phase = phase_for(&self.session);
        self.last_desync = None;
        self.needs_reconcile = false;
        tracing::info!(
            "Tracking session {} at {}/{}",
            self.session.session_key,
            self.session.position,
            self.session.total_length
        );
        Ok(())
    }

    /// Click on a lane: resolve the step and wait (bounded) for its outcome.
    pub async fn handle_click_tile(&mut self, chosen_index: u8) -> Result<StepReport> {
        self.begin_step(chosen_index)?;
        self.finish_step().await
    }

    /// Dispatches a step and enters `Running`. Returns the attempt id.
    pub fn begin_step(&mut self, chosen_index: u8) -> Result<u64> {
        if self.pending.is_some() {
            return Err(AppError::StepInFlight);
        }
        match self.phase {
            MachinePhase::Ready => {}
            MachinePhase::Running => return Err(AppError::StepInFlight),
            MachinePhase::ResolvedWin | MachinePhase::ResolvedTrap => {
                return Err(AppError::SessionResolved)
            }
        }
        if self.needs_reconcile {
            return Err(AppError::ReconcileRequired);
        }
        if self.session.state != SessionState::Running {
            return Err(AppError::NoActiveSession(self.session.identity.clone()));
        }
        if chosen_index >= self.config.lane_count {
            return Err(AppError::BadRequest(format!(
                "Lane {} is out of range (lanes: {})",
                chosen_index, self.config.lane_count
            )));
        }

        let attempt = StepAttempt::new(chosen_index);
        let attempt_id = attempt.id();
        let request = StepRequest {
            identity: self.session.identity.clone(),
            session_key: self.session.session_key.clone(),
            chosen_index,
            payout_recipient: self.owner.clone(),
        };
        let backend = self.backend.clone();
        let handle = tokio::spawn(async move { backend.take_step(request).await });

        self.phase = MachinePhase::Running;
        self.pending = Some(PendingStep { attempt, handle });
        tracing::debug!("Step attempt {} dispatched on lane {}", attempt_id, chosen_index);
        Ok(attempt_id)
    }

    /// Waits up to the display timeout for the in-flight step.
    pub async fn finish_step(&mut self) -> Result<StepReport> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(AppError::BadRequest("No step in flight".to_string()));
        };
        let attempt_id = pending.attempt.id();
        let joined = match timeout(self.config.display_timeout, &mut pending.handle).await {
            Ok(joined) => joined,
            Err(_) => return Ok(StepReport::StillPending { attempt_id }),
        };
        let attempt = match self.pending.take() {
            Some(pending) => pending.attempt,
            None => return Err(AppError::Internal("pending step vanished".to_string())),
        };
        self.phase = MachinePhase::Ready;

        let response = match joined {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("Step attempt {} failed: {}", attempt_id, e);
                self.needs_reconcile = true;
                self.refresh_logged().await;
                return Err(e);
            }
            Err(e) => {
                self.needs_reconcile = true;
                self.refresh_logged().await;
                return Err(AppError::Internal(format!("step task failed: {}", e)));
            }
        };

        let before = self.session.clone();
        let report = match self.apply_response(attempt, response) {
            Ok(report) => report,
            Err(e) => {
                self.needs_reconcile = true;
                self.refresh_logged().await;
                return Err(e);
            }
        };

        let snapshot = self.refresh_logged().await;
        let estimate = || {
            snapshot
                .as_ref()
                .and_then(|after| estimate_step_award(&before, after))
        };
        Ok(match report {
            StepReport::Advanced {
                attempt, position, ..
            } => StepReport::Advanced {
                attempt,
                position,
                award: estimate(),
            },
            StepReport::Won {
                attempt, position, ..
            } => StepReport::Won {
                attempt,
                position,
                award: estimate(),
            },
            other => other,
        })
    }

    fn apply_response(&mut self, attempt: StepAttempt, response: StepResponse) -> Result<StepReport> {
        let position = self.session.position;
        match response.outcome {
            StepOutcome::Safe | StepOutcome::Trap => {
                let (Some(lane), Some(digest)) = (response.safe_lane(), response.tx_digest) else {
                    return Err(AppError::Decode(
                        "resolved step is missing its lane or digest".to_string(),
                    ));
                };
                if response.outcome == StepOutcome::Trap {
                    let attempt = attempt.trap(digest, lane)?;
                    self.board.reveal_trap(position as usize);
                    self.session.state = SessionState::Resolved;
                    self.phase = MachinePhase::ResolvedTrap;
                    tracing::info!("Trap at tile {} of {}", position, self.session.session_key);
                    return Ok(StepReport::Trapped {
                        attempt,
                        trap_tile: position,
                    });
                }

                let attempt = attempt.safe(digest, lane)?;
                self.board.mark_safe(position as usize);
                self.session.position = position + 1;
                if self.session.position >= self.session.total_length {
                    self.session.state = SessionState::Resolved;
                    self.phase = MachinePhase::ResolvedWin;
                    tracing::info!("Session {} completed", self.session.session_key);
                    Ok(StepReport::Won {
                        attempt,
                        position: self.session.position,
                        award: None,
                    })
                } else {
                    self.phase = MachinePhase::Ready;
                    Ok(StepReport::Advanced {
                        attempt,
                        position: self.session.position,
                        award: None,
                    })
                }
            }
            StepOutcome::Rejected { reason } => {
                tracing::info!("Step rejected ({:?}); position stays {}", reason, position);
                let attempt = attempt.reject(reason, response.tx_digest)?;
                self.phase = MachinePhase::Ready;
                Ok(StepReport::Rejected { attempt })
            }
            StepOutcome::Pending => Err(AppError::Decode(
                "backend returned an unresolved step".to_string(),
            )),
        }
    }

    /// Settles a resolved session so a new one can start. Settlement
    /// consumes the player's identity token, so the response normally
    /// carries a prepared transaction; local state stays resolved until
    /// `confirm_settle` reports the wallet's digest.
    pub async fn settle(&mut self) -> Result<SettleResponse> {
        self.settle_with(None).await
    }

    /// Waits for a wallet-submitted settlement and resets the session.
    pub async fn confirm_settle(&mut self, tx_digest: String) -> Result<SettleResponse> {
        self.settle_with(Some(tx_digest)).await
    }

    async fn settle_with(&mut self, onchain_tx_digest: Option<String>) -> Result<SettleResponse> {
        self.ensure_idle()?;
        if !matches!(self.phase, MachinePhase::ResolvedWin | MachinePhase::ResolvedTrap) {
            return Err(AppError::BadRequest(
                "Only resolved sessions can be settled".to_string(),
            ));
        }
        let response = self
            .backend
            .settle_game(SettleRequest {
                identity: self.session.identity.clone(),
                owner: self.owner.clone(),
                onchain_tx_digest,
            })
            .await?;

        if response.requires_wallet_signature {
            tracing::debug!(
                "Settlement of {} waits for the wallet",
                self.session.session_key
            );
        } else if response.success {
            self.session =
                GameSession::ready(self.session.identity.clone(), self.session.session_key.clone());
            self.board = Board::empty();
            self.phase = MachinePhase::Ready;
            self.refresh_logged().await;
        }
        Ok(response)
    }

    /// Fetches the authoritative snapshot and reconciles against it.
    pub async fn refresh(&mut self) -> Result<Observed> {
        let snapshot = self
            .backend
            .fetch_session(&self.session.identity, &self.session.session_key)
            .await?;
        self.needs_reconcile = false;
        Ok(self.apply_observation(snapshot))
    }

    pub fn apply_observation(&mut self, snapshot: Option<GameSessionSnapshot>) -> Observed {
        self.apply_observation_at(snapshot, Utc::now())
    }

    pub fn apply_observation_at(
        &mut self,
        snapshot: Option<GameSessionSnapshot>,
        now: DateTime<Utc>,
    ) -> Observed {
        if self.pending.is_some() {
            return Observed::Deferred;
        }
        match self
            .reconciler
            .observe(&self.session, &self.board, snapshot.as_ref(), now)
        {
            ReconcileStep::Applied(reconciled) => self.adopt(reconciled),
            ReconcileStep::AwaitingVisibility { misses } => {
                tracing::debug!(
                    "Session {} not visible yet ({} misses)",
                    self.session.session_key,
                    misses
                );
                Observed::AwaitingVisibility { misses }
            }
            ReconcileStep::SessionGone(session) => {
                tracing::warn!(
                    "Session {} gone after grace window; resetting",
                    self.session.session_key
                );
                self.session = session;
                self.board = Board::empty();
                self.phase = MachinePhase::Ready;
                Observed::SessionReset
            }
            ReconcileStep::Idle => Observed::Idle,
        }
    }

    fn adopt(&mut self, reconciled: Reconciled) -> Observed {
        self.session = reconciled.session;
        self.board = reconciled.board;
        match reconciled.desync {
            Some(desync) => {
                tracing::info!(
                    "Desync on {}: local {}/{} vs chain {}/{}; board rebuilt",
                    desync.session_key,
                    desync.local_position,
                    desync.local_total,
                    desync.remote_position,
                    desync.remote_total
                );
                self.phase = phase_for(&self.session);
                self.last_desync = Some(desync.clone());
                Observed::Rebuilt(desync)
            }
            None => Observed::InSync,
        }
    }

    /// Refresh where a failure must not mask the caller's own result.
    async fn refresh_logged(&mut self) -> Option<GameSessionSnapshot> {
        let fetched = self
            .backend
            .fetch_session(&self.session.identity, &self.session.session_key)
            .await;
        match fetched {
            Ok(snapshot) => {
                self.needs_reconcile = false;
                self.apply_observation(snapshot.clone());
                snapshot
            }
            Err(e) => {
                tracing::warn!("Reconciliation fetch failed: {}", e);
                None
            }
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.pending.is_some() {
            return Err(AppError::StepInFlight);
        }
        Ok(())
    }
}

fn phase_for(session: &GameSession) -> MachinePhase {
    match session.state {
        SessionState::Resolved => MachinePhase::ResolvedWin,
        SessionState::Ready | SessionState::Running => MachinePhase::Ready,
    }
}
