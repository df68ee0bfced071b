use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    constants::ENDLESS_KEY_MAX_LEN,
    error::{AppError, Result},
};

/// Correlates the steps of one run. Endless mode has no generated key and
/// addresses a row of the shared endless game instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Keyed(String),
    Endless { row: u8 },
}

impl SessionKey {
    /// Parses the wire form: keys of at most three characters are an
    /// endless-mode row selector.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() > ENDLESS_KEY_MAX_LEN {
            return Ok(SessionKey::Keyed(trimmed.to_string()));
        }
        let row = if trimmed.is_empty() {
            0
        } else {
            trimmed.parse::<u8>().map_err(|_| {
                AppError::BadRequest(format!("Invalid endless row selector: {}", raw))
            })?
        };
        Ok(SessionKey::Endless { row })
    }

    pub fn is_endless(&self) -> bool {
        matches!(self, SessionKey::Endless { .. })
    }

    pub fn wire(&self) -> String {
        match self {
            SessionKey::Keyed(key) => key.clone(),
            SessionKey::Endless { row } => row.to_string(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Keyed(key) => write!(f, "{}", key),
            SessionKey::Endless { row } => write!(f, "endless#{}", row),
        }
    }
}

impl Serialize for SessionKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire())
    }
}

impl<'de> Deserialize<'de> for SessionKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SessionKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No active run.
    Ready,
    /// A run is active and accepts steps.
    Running,
    /// The run ended and must be settled before a new one starts.
    Resolved,
}

/// Authoritative progress of one session as read from chain storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSessionSnapshot {
    pub session_key: SessionKey,
    pub position: u64,
    pub total_length: u64,
    pub accrued_reward: u64,
    pub final_reward: u64,
}

impl GameSessionSnapshot {
    pub fn state(&self) -> SessionState {
        if self.position >= self.total_length {
            SessionState::Resolved
        } else {
            SessionState::Running
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total_length.saturating_sub(self.position)
    }
}

/// The identity's entry in the data pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub identity: String,
    /// Purchased step balance.
    pub steps: u64,
    pub games: Vec<GameSessionSnapshot>,
}

impl AccountInfo {
    pub fn game(&self, key: &SessionKey) -> Option<&GameSessionSnapshot> {
        self.games.iter().find(|g| &g.session_key == key)
    }
}

/// Client-side view of a session, owned by a single controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub session_key: SessionKey,
    pub identity: String,
    pub position: u64,
    pub total_length: u64,
    pub accrued_reward: u64,
    pub final_reward: u64,
    pub state: SessionState,
}

impl GameSession {
    pub fn ready(identity: impl Into<String>, session_key: SessionKey) -> Self {
        Self {
            session_key,
            identity: identity.into(),
            position: 0,
            total_length: 0,
            accrued_reward: 0,
            final_reward: 0,
            state: SessionState::Ready,
        }
    }

    pub fn from_snapshot(identity: impl Into<String>, snapshot: &GameSessionSnapshot) -> Self {
        Self {
            session_key: snapshot.session_key.clone(),
            identity: identity.into(),
            position: snapshot.position,
            total_length: snapshot.total_length.max(snapshot.position),
            accrued_reward: snapshot.accrued_reward,
            final_reward: snapshot.final_reward,
            state: snapshot.state(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != SessionState::Ready
    }

    /// True when the progress counters disagree with the snapshot.
    pub fn diverges_from(&self, remote: &GameSessionSnapshot) -> bool {
        self.position != remote.position || self.total_length != remote.total_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_keys_select_endless_rows() {
        assert_eq!(SessionKey::parse("2").unwrap(), SessionKey::Endless { row: 2 });
        assert_eq!(SessionKey::parse("").unwrap(), SessionKey::Endless { row: 0 });
        assert!(SessionKey::parse("abc").is_err());
    }

    #[test]
    fn long_keys_are_keyed_sessions() {
        let key = SessionKey::parse("0x1a2b3c4d").unwrap();
        assert_eq!(key, SessionKey::Keyed("0x1a2b3c4d".to_string()));
        assert!(!key.is_endless());
    }

    #[test]
    fn session_key_serializes_as_wire_string() {
        let json = serde_json::to_string(&SessionKey::Endless { row: 7 }).unwrap();
        assert_eq!(json, "\"7\"");
        let back: SessionKey = serde_json::from_str("\"abcdef\"").unwrap();
        assert_eq!(back, SessionKey::Keyed("abcdef".to_string()));
    }

    #[test]
    fn snapshot_state_follows_progress() {
        let mut snapshot = GameSessionSnapshot {
            session_key: SessionKey::Keyed("k".repeat(32)),
            position: 4,
            total_length: 5,
            accrued_reward: 3,
            final_reward: 100,
        };
        assert_eq!(snapshot.state(), SessionState::Running);
        snapshot.position = 5;
        assert_eq!(snapshot.state(), SessionState::Resolved);
        assert_eq!(snapshot.remaining(), 0);
    }

    #[test]
    fn divergence_checks_position_and_length_only() {
        let snapshot = GameSessionSnapshot {
            session_key: SessionKey::Keyed("k".repeat(32)),
            position: 2,
            total_length: 5,
            accrued_reward: 9,
            final_reward: 100,
        };
        let mut local = GameSession::from_snapshot("0xabc", &snapshot);
        local.accrued_reward = 0;
        assert!(!local.diverges_from(&snapshot));
        local.position = 3;
        assert!(local.diverges_from(&snapshot));
    }
}
