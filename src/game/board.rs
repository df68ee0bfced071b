use serde::Serialize;

use super::session::GameSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Unresolved,
    Safe,
    Trap,
}

/// Rendered board, one tile per step position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    tiles: Vec<Tile>,
}

impl Board {
    pub fn empty() -> Self {
        Self { tiles: Vec::new() }
    }

    /// Lays out `position` safe tiles followed by unresolved ones. Never
    /// reveals a trap: a trap only exists on a resolved local session.
    pub fn rebuild(position: u64, total_length: u64) -> Self {
        let total = total_length.max(position) as usize;
        let safe = position as usize;
        let mut tiles = vec![Tile::Safe; safe];
        tiles.resize(total, Tile::Unresolved);
        Self { tiles }
    }

    pub fn for_session(session: &GameSession) -> Self {
        Self::rebuild(session.position, session.total_length)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn safe_count(&self) -> usize {
        self.tiles.iter().filter(|t| **t == Tile::Safe).count()
    }

    pub fn trap_at(&self) -> Option<usize> {
        self.tiles.iter().position(|t| *t == Tile::Trap)
    }

    pub(crate) fn mark_safe(&mut self, index: usize) {
        self.ensure_len(index + 1);
        self.tiles[index] = Tile::Safe;
    }

    pub(crate) fn reveal_trap(&mut self, index: usize) {
        self.ensure_len(index + 1);
        self.tiles[index] = Tile::Trap;
    }

    fn ensure_len(&mut self, len: usize) {
        if self.tiles.len() < len {
            self.tiles.resize(len, Tile::Unresolved);
        }
    }
}
