use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AppError, Result};

static NEXT_ATTEMPT_ID: AtomicU64 = AtomicU64::new(1);

/// Animation hint only; never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// Simulation reported failure; nothing was submitted.
    DryRunFailed(String),
    /// Simulation passed but execution failed: the chain state moved in between.
    StaleSession(String),
    /// Executed, but no step event was emitted.
    MissingEvent,
    /// The event carried a value outside the lane encoding.
    UnknownOutcome(i64),
    /// The backend refused the step without giving a typed reason.
    Backend(String),
}

impl RejectReason {
    /// The chain state certainly moved under this attempt.
    pub fn is_stale_session(&self) -> bool {
        matches!(self, RejectReason::StaleSession(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Pending,
    Safe,
    Trap,
    Rejected { reason: RejectReason },
}

impl StepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Pending => "pending",
            StepOutcome::Safe => "safe",
            StepOutcome::Trap => "trap",
            StepOutcome::Rejected { .. } => "rejected",
        }
    }
}

/// One user move. Created pending; resolving it yields a new, final value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAttempt {
    id: u64,
    chosen_index: u8,
    direction: Direction,
    outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    safe_lane: Option<u8>,
}

impl StepAttempt {
    pub fn new(chosen_index: u8) -> Self {
        Self {
            id: NEXT_ATTEMPT_ID.fetch_add(1, Ordering::Relaxed),
            chosen_index,
            direction: Direction::Forward,
            outcome: StepOutcome::Pending,
            digest: None,
            safe_lane: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn chosen_index(&self) -> u8 {
        self.chosen_index
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn outcome(&self) -> &StepOutcome {
        &self.outcome
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn safe_lane(&self) -> Option<u8> {
        self.safe_lane
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, StepOutcome::Pending)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.outcome {
            StepOutcome::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    /// Resolves a safe landing.
    pub fn safe(self, digest: String, safe_lane: u8) -> Result<Self> {
        self.finish(StepOutcome::Safe, Some(digest), Some(safe_lane))
    }

    /// Resolves a trap. The player slides back, hence the backward direction.
    pub fn trap(self, digest: String, safe_lane: u8) -> Result<Self> {
        self.finish(StepOutcome::Trap, Some(digest), Some(safe_lane))
    }

    pub fn reject(self, reason: RejectReason, digest: Option<String>) -> Result<Self> {
        self.finish(StepOutcome::Rejected { reason }, digest, None)
    }

    fn finish(
        self,
        outcome: StepOutcome,
        digest: Option<String>,
        safe_lane: Option<u8>,
    ) -> Result<Self> {
        if !self.is_pending() {
            return Err(AppError::Internal(format!(
                "Step attempt {} is already {}",
                self.id,
                self.outcome.label()
            )));
        }
        let direction = match outcome {
            StepOutcome::Safe => Direction::Forward,
            _ => Direction::Backward,
        };
        Ok(Self {
            id: self.id,
            chosen_index: self.chosen_index,
            direction,
            outcome,
            digest,
            safe_lane,
        })
    }

    /// Builds the follow-up attempt for a rejected one. Only rejected
    /// attempts can be retried; the old attempt is never reused.
    pub fn retry(&self) -> Result<StepAttempt> {
        match self.outcome {
            StepOutcome::Rejected { .. } => Ok(StepAttempt::new(self.chosen_index)),
            _ => Err(AppError::BadRequest(format!(
                "Only rejected attempts can be retried (attempt {} is {})",
                self.id,
                self.outcome.label()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_attempts_are_pending_and_forward() {
        let attempt = StepAttempt::new(1);
        assert!(attempt.is_pending());
        assert_eq!(attempt.direction(), Direction::Forward);
        assert_eq!(attempt.chosen_index(), 1);
    }

    #[test]
    fn resolved_attempt_cannot_be_resolved_again() {
        let safe = StepAttempt::new(0).safe("0xd1".to_string(), 0).unwrap();
        assert_eq!(safe.outcome(), &StepOutcome::Safe);
        assert!(safe.clone().trap("0xd2".to_string(), 1).is_err());
    }

    #[test]
    fn trap_slides_backward() {
        let trap = StepAttempt::new(1).trap("0xd1".to_string(), 0).unwrap();
        assert_eq!(trap.direction(), Direction::Backward);
        assert_eq!(trap.safe_lane(), Some(0));
    }

    #[test]
    fn retry_creates_a_fresh_attempt() {
        let rejected = StepAttempt::new(1)
            .reject(RejectReason::DryRunFailed("insufficient stake".into()), None)
            .unwrap();
        let retry = rejected.retry().unwrap();
        assert!(retry.is_pending());
        assert_ne!(retry.id(), rejected.id());
        assert_eq!(retry.chosen_index(), 1);
        assert!(rejected.reject_reason().is_some());
    }

    #[test]
    fn only_rejected_attempts_retry() {
        assert!(StepAttempt::new(0).retry().is_err());
        let safe = StepAttempt::new(0).safe("0xd".into(), 0).unwrap();
        assert!(safe.retry().is_err());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let rejected = StepAttempt::new(0)
            .reject(RejectReason::StaleSession("moved".into()), Some("0xd".into()))
            .unwrap();
        let json = serde_json::to_value(rejected.outcome()).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["reason"]["kind"], "stale_session");
    }
}
