use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};

use super::{
    backend::GameBackend,
    session::{GameSessionSnapshot, SessionKey},
};

/// One poll result. `snapshot` is `None` when the session was not found.
#[derive(Debug, Clone)]
pub struct SessionObservation {
    pub snapshot: Option<GameSessionSnapshot>,
}

/// Periodically fetches the session snapshot and hands it to whoever owns
/// the controller. A failed fetch skips its tick. The task ends when the
/// receiver is dropped.
pub fn spawn_session_poller(
    backend: Arc<dyn GameBackend>,
    identity: String,
    session_key: SessionKey,
    poll_interval: Duration,
    sender: mpsc::Sender<SessionObservation>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if sender.is_closed() {
                break;
            }
            match backend.fetch_session(&identity, &session_key).await {
                Ok(snapshot) => {
                    if sender.send(SessionObservation { snapshot }).await.is_err() {
                        break;
                    }
                }
                Err(e) if e.is_transport() => {
                    tracing::warn!("Session poll for {} failed: {}", session_key, e);
                }
                Err(e) => {
                    tracing::error!("Session poll for {} skipped: {}", session_key, e);
                }
            }
        }
        tracing::debug!("Session poller for {} exited", session_key);
    })
}
