//! Snapshot building for network transmission

use std::collections::BTreeMap;

use crate::ws::protocol::{EntitySnapshot, StateSnapshot};

use super::components::HITBOX_SIZE;
use super::entity::{Entity, EntityId, Registry};

/// Builds read-only views of a session
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn entity(entity: &Entity) -> EntitySnapshot {
        let kin = entity.kinematics();
        let side = HITBOX_SIZE as u32;
        match entity {
            Entity::Player(p) => EntitySnapshot {
                kind: entity.kind(),
                x: kin.x,
                y: kin.y,
                hp: p.health.hp,
                armor: p.armor.value,
                is_blocking: p.armor.is_blocking,
                width: side,
                height: side,
            },
            Entity::Obstacle(o) => EntitySnapshot {
                kind: entity.kind(),
                x: kin.x,
                y: kin.y,
                hp: 0,
                armor: 0,
                is_blocking: false,
                width: o.width,
                height: o.height,
            },
            Entity::Bullet(_) => EntitySnapshot {
                kind: entity.kind(),
                x: kin.x,
                y: kin.y,
                hp: 0,
                armor: 0,
                is_blocking: false,
                width: side,
                height: side,
            },
        }
    }

    pub fn build(
        registry: &Registry,
        players: &[EntityId],
        is_running: bool,
        game_over: bool,
        winner: Option<EntityId>,
    ) -> StateSnapshot {
        let entities: BTreeMap<EntityId, EntitySnapshot> = registry
            .iter()
            .map(|(id, entity)| (id.clone(), Self::entity(entity)))
            .collect();

        StateSnapshot {
            entities,
            game_over,
            is_running,
            players: players.to_vec(),
            winner,
        }
    }
}

/// Broadcast volume counters for the health endpoint
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct SnapshotStats {
    pub snapshots_sent: u64,
    pub bytes_sent: u64,
}

impl SnapshotStats {
    /// Record one snapshot fanned out to `recipients` sockets
    pub fn record(&mut self, recipients: usize, bytes: usize) {
        self.snapshots_sent += 1;
        self.bytes_sent += (recipients * bytes) as u64;
    }
}
