//! Local-vs-chain reconciliation. `reconcile` is a pure function; the
//! `Reconciler` adds the grace window for sessions that are not visible yet.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{
    board::Board,
    session::{GameSession, GameSessionSnapshot, SessionKey, SessionState},
};

/// Local progress disagreed with the chain and was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesyncDetected {
    pub session_key: SessionKey,
    pub local_position: u64,
    pub local_total: u64,
    pub remote_position: u64,
    pub remote_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub session: GameSession,
    pub board: Board,
    pub desync: Option<DesyncDetected>,
}

pub fn reconcile(local: &GameSession, board: &Board, remote: &GameSessionSnapshot) -> Reconciled {
    if is_trapped(local, board)
        && local.session_key == remote.session_key
        && local.position == remote.position
    {
        return keep_trapped(local, remote);
    }

    if local.session_key != remote.session_key || local.diverges_from(remote) {
        let session = GameSession::from_snapshot(local.identity.clone(), remote);
        let board = Board::for_session(&session);
        let desync = DesyncDetected {
            session_key: remote.session_key.clone(),
            local_position: local.position,
            local_total: local.total_length,
            remote_position: remote.position,
            remote_total: remote.total_length,
        };
        return Reconciled {
            session,
            board,
            desync: Some(desync),
        };
    }

    let mut session = local.clone();
    session.accrued_reward = remote.accrued_reward;
    session.final_reward = remote.final_reward;
    if session.state == SessionState::Ready {
        session.state = remote.state();
    }
    Reconciled {
        session,
        board: board.clone(),
        desync: None,
    }
}

fn is_trapped(local: &GameSession, board: &Board) -> bool {
    local.state == SessionState::Resolved && board.trap_at() == Some(local.position as usize)
}

/// The chain lengthens a run on a failure, so a trapped session only takes
/// the remote counters and stays resolved until it is settled.
fn keep_trapped(local: &GameSession, remote: &GameSessionSnapshot) -> Reconciled {
    let mut session = local.clone();
    session.total_length = remote.total_length.max(remote.position);
    session.accrued_reward = remote.accrued_reward;
    session.final_reward = remote.final_reward;
    let mut board = Board::for_session(&session);
    board.reveal_trap(session.position as usize);
    Reconciled {
        session,
        board,
        desync: None,
    }
}

/// Award preview shown after a step, computed from the pre-step view.
/// `None` when the chain did not advance by exactly one step.
pub fn estimate_step_award(before: &GameSession, after: &GameSessionSnapshot) -> Option<u64> {
    if after.position != before.position + 1 {
        return None;
    }
    let step_award = before.accrued_reward + 1;
    if before.position + 1 >= before.total_length {
        return Some(step_award + before.final_reward);
    }
    let remaining = before.total_length - before.position;
    Some(step_award / 2 + before.final_reward / remaining)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStep {
    Applied(Reconciled),
    /// Session missing remotely, still inside the grace window.
    AwaitingVisibility { misses: u32 },
    /// Session missing for the whole grace window; local state resets.
    SessionGone(GameSession),
    /// Nothing local and nothing remote.
    Idle,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    grace_polls: u32,
    grace_window: Duration,
    misses: u32,
    first_miss_at: Option<DateTime<Utc>>,
}

impl Reconciler {
    pub fn new(grace_polls: u32, grace_window: Duration) -> Self {
        Self {
            grace_polls,
            grace_window,
            misses: 0,
            first_miss_at: None,
        }
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn observe(
        &mut self,
        local: &GameSession,
        board: &Board,
        remote: Option<&GameSessionSnapshot>,
        now: DateTime<Utc>,
    ) -> ReconcileStep {
        if let Some(remote) = remote {
            self.misses = 0;
            self.first_miss_at = None;
            return ReconcileStep::Applied(reconcile(local, board, remote));
        }

        if !local.is_active() {
            return ReconcileStep::Idle;
        }

        self.misses += 1;
        let first = *self.first_miss_at.get_or_insert(now);
        if self.misses >= self.grace_polls && now - first >= self.grace_window {
            self.misses = 0;
            self.first_miss_at = None;
            return ReconcileStep::SessionGone(GameSession::ready(
                local.identity.clone(),
                local.session_key.clone(),
            ));
        }
        ReconcileStep::AwaitingVisibility {
            misses: self.misses,
        }
    }
}
