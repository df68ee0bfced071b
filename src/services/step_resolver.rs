use std::sync::Arc;

use crate::{
    chain::{decode::StepEvent, transaction::UnsignedTx, ChainRpc, ExecutionStatus},
    error::{AppError, Result},
    game::attempt::{RejectReason, StepAttempt},
};

/// How a decoded `safe_pos` relates to the lane the player picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneVerdict {
    Safe(u8),
    Trap(u8),
    Unknown(i64),
}

pub fn classify_safe_pos(safe_pos: i64, chosen_index: u8, lane_count: u8) -> LaneVerdict {
    if !(0..lane_count as i64).contains(&safe_pos) {
        return LaneVerdict::Unknown(safe_pos);
    }
    let safe_lane = safe_pos as u8;
    if safe_lane == chosen_index {
        LaneVerdict::Safe(safe_lane)
    } else {
        LaneVerdict::Trap(safe_lane)
    }
}

/// Dry-runs, executes and classifies a single step transaction.
pub struct StepResolver {
    chain: Arc<dyn ChainRpc>,
    lane_count: u8,
}

impl StepResolver {
    pub fn new(chain: Arc<dyn ChainRpc>, lane_count: u8) -> Self {
        Self { chain, lane_count }
    }

    /// Resolves `attempt` by submitting `tx`.
    ///
    /// Simulation and post-execute failures end the attempt as `Rejected`.
    /// RPC failures where no result was obtained are returned as errors and
    /// leave the attempt untouched in the caller's hands.
    pub async fn resolve_step(&self, attempt: StepAttempt, tx: &UnsignedTx) -> Result<StepAttempt> {
        if !attempt.is_pending() {
            return Err(AppError::Internal(format!(
                "Attempt {} was already resolved",
                attempt.id()
            )));
        }
        let Some(sender) = tx.sender.as_deref() else {
            return Err(AppError::BadRequest(
                "Step transaction has no sender to simulate as".to_string(),
            ));
        };

        let dry_run = self.chain.dry_run(tx).await?;
        if let ExecutionStatus::Failure(reason) = dry_run.status {
            tracing::info!(
                "Step attempt {} rejected by dry-run for {}: {}",
                attempt.id(),
                sender,
                reason
            );
            return attempt.reject(RejectReason::DryRunFailed(reason), None);
        }

        let executed = self.chain.execute(tx).await?;
        if let ExecutionStatus::Failure(reason) = executed.status {
            tracing::warn!(
                "Step attempt {} failed on execute after a clean dry-run ({}): {}",
                attempt.id(),
                executed.digest,
                reason
            );
            let digest = Some(executed.digest).filter(|d| !d.is_empty());
            return attempt.reject(RejectReason::StaleSession(reason), digest);
        }

        self.chain.wait_for_finality(&executed.digest).await?;

        let Some(event) = StepEvent::from_events(&executed.events) else {
            tracing::warn!(
                "Step tx {} finalized without a step event",
                executed.digest
            );
            return attempt.reject(RejectReason::MissingEvent, Some(executed.digest));
        };

        let chosen = attempt.chosen_index();
        match classify_safe_pos(event.safe_pos, chosen, self.lane_count) {
            LaneVerdict::Safe(lane) => {
                tracing::debug!("Step {} safe on lane {}", executed.digest, lane);
                attempt.safe(executed.digest, lane)
            }
            LaneVerdict::Trap(lane) => {
                tracing::debug!(
                    "Step {} trapped: chose lane {}, safe lane was {}",
                    executed.digest,
                    chosen,
                    lane
                );
                attempt.trap(executed.digest, lane)
            }
            LaneVerdict::Unknown(safe_pos) => {
                tracing::warn!(
                    "Step {} reported unknown safe_pos {}",
                    executed.digest,
                    safe_pos
                );
                attempt.reject(RejectReason::UnknownOutcome(safe_pos), Some(executed.digest))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::fake::FakeChain,
        config::test_config,
        constants::SAFE_POS_REJECTED,
        game::{
            attempt::StepOutcome,
            session::SessionKey,
            transactions::{build_step_tx, StepTxParams},
        },
    };

    const PLAYER: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";
    const IDENTITY: &str = "0x00000000000000000000000000000000000000000000000000000000000000bb";

    fn setup() -> (Arc<FakeChain>, StepResolver, SessionKey) {
        let config = test_config();
        let chain = Arc::new(FakeChain::new(config.objects.clone()));
        let key = SessionKey::Keyed("k".repeat(40));
        chain.seed_game(IDENTITY, &key.wire(), 0, 5);
        let resolver = StepResolver::new(chain.clone(), config.lane_count);
        (chain, resolver, key)
    }

    fn step_tx(key: &SessionKey, lane: u8) -> UnsignedTx {
        let config = test_config();
        build_step_tx(
            &config.objects,
            StepTxParams {
                identity: IDENTITY,
                session_key: key,
                chosen_index: lane,
                lane_count: config.lane_count,
                payout_recipient: PLAYER,
                sender: PLAYER,
                gas_budget: config.gas_budget,
            },
        )
        .unwrap()
    }

    #[test]
    fn safe_pos_outside_lanes_is_unknown() {
        assert_eq!(classify_safe_pos(1, 1, 2), LaneVerdict::Safe(1));
        assert_eq!(classify_safe_pos(0, 1, 2), LaneVerdict::Trap(0));
        assert_eq!(classify_safe_pos(2, 1, 2), LaneVerdict::Unknown(2));
        assert_eq!(
            classify_safe_pos(SAFE_POS_REJECTED, 0, 2),
            LaneVerdict::Unknown(SAFE_POS_REJECTED)
        );
    }

    #[tokio::test]
    async fn matching_lane_is_safe_after_finality() {
        let (chain, resolver, key) = setup();
        chain.push_safe_pos(1);
        let resolved = resolver
            .resolve_step(StepAttempt::new(1), &step_tx(&key, 1))
            .await
            .unwrap();
        assert_eq!(resolved.outcome(), &StepOutcome::Safe);
        assert!(resolved.digest().is_some());
        assert_eq!(chain.finality_waits(), 1);
        assert_eq!(chain.game(IDENTITY, &key.wire()).unwrap().list, 1);
    }

    #[tokio::test]
    async fn other_lane_is_a_trap() {
        let (chain, resolver, key) = setup();
        chain.push_safe_pos(0);
        let resolved = resolver
            .resolve_step(StepAttempt::new(1), &step_tx(&key, 1))
            .await
            .unwrap();
        assert_eq!(resolved.outcome(), &StepOutcome::Trap);
        assert_eq!(resolved.safe_lane(), Some(0));
        assert_eq!(chain.game(IDENTITY, &key.wire()).unwrap().list, 0);
    }

    #[tokio::test]
    async fn dry_run_failure_never_executes() {
        let (chain, resolver, key) = setup();
        chain.fail_next_dry_run("InsufficientCoinBalance");
        let resolved = resolver
            .resolve_step(StepAttempt::new(0), &step_tx(&key, 0))
            .await
            .unwrap();
        assert!(matches!(
            resolved.reject_reason(),
            Some(RejectReason::DryRunFailed(reason)) if reason.contains("Insufficient")
        ));
        assert!(chain.executed().is_empty());
        assert_eq!(chain.finality_waits(), 0);
    }

    #[tokio::test]
    async fn execute_failure_after_clean_dry_run_is_stale() {
        let (chain, resolver, key) = setup();
        chain.stale_next_execute();
        let resolved = resolver
            .resolve_step(StepAttempt::new(0), &step_tx(&key, 0))
            .await
            .unwrap();
        let reason = resolved.reject_reason().unwrap();
        assert!(reason.is_stale_session());
        assert!(resolved.digest().is_some());
    }

    #[tokio::test]
    async fn missing_event_is_rejected() {
        let (chain, resolver, key) = setup();
        chain.drop_next_events();
        let resolved = resolver
            .resolve_step(StepAttempt::new(0), &step_tx(&key, 0))
            .await
            .unwrap();
        assert_eq!(resolved.reject_reason(), Some(&RejectReason::MissingEvent));
    }

    #[tokio::test]
    async fn sentinel_safe_pos_is_rejected() {
        let (chain, resolver, key) = setup();
        chain.push_safe_pos(SAFE_POS_REJECTED);
        let resolved = resolver
            .resolve_step(StepAttempt::new(0), &step_tx(&key, 0))
            .await
            .unwrap();
        assert_eq!(
            resolved.reject_reason(),
            Some(&RejectReason::UnknownOutcome(SAFE_POS_REJECTED))
        );
    }

    #[tokio::test]
    async fn transport_failure_is_an_error_not_a_reject() {
        let (chain, resolver, key) = setup();
        chain.fail_next_transport();
        let err = resolver
            .resolve_step(StepAttempt::new(0), &step_tx(&key, 0))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn transaction_without_sender_is_refused() {
        let (chain, resolver, key) = setup();
        let mut tx = step_tx(&key, 0);
        tx.sender = None;
        let err = resolver
            .resolve_step(StepAttempt::new(0), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(chain.dry_runs(), 0);
    }
}
