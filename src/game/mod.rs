pub mod attempt;
pub mod backend;
pub mod board;
pub mod controller;
pub mod poller;
pub mod reconcile;
pub mod session;
pub mod session_key;
pub mod transactions;

pub use attempt::{RejectReason, StepAttempt, StepOutcome};
pub use backend::GameBackend;
pub use controller::{ControllerConfig, GameController, MachinePhase, Observed, StepReport};
pub use session::{GameSession, GameSessionSnapshot, SessionKey, SessionState};
