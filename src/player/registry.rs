use std::sync::Weak;

use dashmap::DashMap;
use uuid::Uuid;

use super::{Player, PlayerInner};

/// Process-wide lookup of live players, keyed by player id.
///
/// Entries are weak: dropping the last handle to a player makes it vanish
/// from [`get_all`](Self::get_all) even without an explicit removal.
#[derive(Default)]
pub struct PlayerRegistry {
    players: DashMap<Uuid, Weak<PlayerInner>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, player: &Player) {
        self.players.insert(player.id(), std::sync::Arc::downgrade(&player.inner));
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.players.remove(&id).is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<Player> {
        let inner = self.players.get(&id)?.upgrade()?;
        Some(Player::from_inner(inner))
    }

    pub fn get_all(&self) -> Vec<Player> {
        self.players.retain(|_, player| player.strong_count() > 0);
        self.players
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .map(Player::from_inner)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&self) {
        self.players.clear();
    }
}
