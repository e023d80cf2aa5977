//! Waiting queue of connected-but-unmatched players

use std::collections::VecDeque;

use crate::game::EntityId;

/// Players waiting to be paired, in arrival order
#[derive(Debug, Default)]
pub struct WaitingQueue {
    queue: VecDeque<EntityId>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to the back of the queue
    pub fn enqueue(&mut self, player_id: EntityId) {
        // Remove if already in queue (rejoin)
        self.queue.retain(|p| *p != player_id);
        self.queue.push_back(player_id);
    }

    /// Remove a player from the queue
    pub fn remove(&mut self, player_id: &str) -> bool {
        if let Some(pos) = self.queue.iter().position(|p| p == player_id) {
            self.queue.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.queue.iter().any(|p| p == player_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.queue.iter()
    }

    /// Take the first two players, if two are waiting
    pub fn try_pair(&mut self) -> Option<(EntityId, EntityId)> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }

    /// Replace the queue contents
    pub fn reseed<I>(&mut self, players: I)
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.queue.clear();
        for player_id in players {
            self.enqueue(player_id);
        }
    }
}
