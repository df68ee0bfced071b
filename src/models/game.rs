use serde::{Deserialize, Serialize};

use crate::{
    chain::transaction::UnsignedTx,
    constants::SAFE_POS_REJECTED,
    game::{
        attempt::{Direction, RejectReason, StepAttempt, StepOutcome},
        session::{GameSessionSnapshot, SessionKey, SessionState},
    },
};

// ==================== START ====================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartGameRequest {
    /// Player address. Signs the start transaction and receives a minted
    /// identity token.
    pub owner: String,
    /// Existing identity token; omitted to mint on first play.
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub stake_amount: Option<u64>,
    #[serde(default)]
    pub stake_coin: Option<String>,
    /// Set when the player already submitted the prepared transaction.
    #[serde(default)]
    pub onchain_tx_digest: Option<String>,
    /// Key of the prepared transaction the digest belongs to.
    #[serde(default)]
    pub session_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartGameResponse {
    pub session_key: SessionKey,
    pub identity: Option<String>,
    pub tx_digest: Option<String>,
    pub requires_wallet_signature: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_tx: Option<UnsignedTx>,
}

// ==================== STEP ====================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRequest {
    pub identity: String,
    /// Generated key, or a row selector of at most three digits for the
    /// endless game.
    pub session_key: SessionKey,
    pub chosen_index: u8,
    pub payout_recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResponse {
    #[serde(flatten)]
    pub outcome: StepOutcome,
    /// Safe lane as the contract reported it, `-2` when unresolved.
    pub safe_pos: i64,
    pub direction: Direction,
    #[serde(default)]
    pub tx_digest: Option<String>,
}

impl StepResponse {
    pub fn from_attempt(attempt: &StepAttempt) -> Self {
        let safe_pos = match attempt.safe_lane() {
            Some(lane) => lane as i64,
            None => SAFE_POS_REJECTED,
        };
        Self {
            outcome: attempt.outcome().clone(),
            safe_pos,
            direction: attempt.direction(),
            tx_digest: attempt.digest().map(str::to_string),
        }
    }

    pub fn safe_lane(&self) -> Option<u8> {
        u8::try_from(self.safe_pos).ok()
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.outcome {
            StepOutcome::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

// ==================== SESSION INFO ====================
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInfoQuery {
    #[serde(default)]
    pub session_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfoResponse {
    pub identity: String,
    pub state: SessionState,
    pub session: Option<GameSessionSnapshot>,
    /// Purchased steps left on the identity's account.
    pub steps: u64,
    /// Every session the identity has not settled yet.
    pub games: Vec<GameSessionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndlessInfoResponse {
    pub state: SessionState,
    pub session: GameSessionSnapshot,
}

// ==================== SETTLE ====================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettleRequest {
    pub identity: String,
    pub owner: String,
    #[serde(default)]
    pub onchain_tx_digest: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub success: bool,
    pub tx_digest: Option<String>,
    pub requires_wallet_signature: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_tx: Option<UnsignedTx>,
}

// ==================== IDENTITY / STEPS ====================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub owner: String,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyStepsRequest {
    pub identity: String,
    pub owner: String,
    pub amount: u64,
    #[serde(default)]
    pub stake_coin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedTxResponse {
    pub requires_wallet_signature: bool,
    pub prepared_tx: UnsignedTx,
}
