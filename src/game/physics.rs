//! Movement, arena bounds and obstacle collision

use tracing::trace;

use super::components::{Kinematics, HITBOX_SIZE};
use super::entity::{Entity, EntityId, Registry};

/// Axis-aligned box anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn square(x: f32, y: f32, side: f32) -> Self {
        Self::new(x, y, side, side)
    }

    /// Strict overlap: boxes that only share an edge do not collide
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }
}

/// Physics system for advancing movers and resolving obstacle hits
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Largest coordinate a 20-unit hitbox may occupy
    pub fn max_coord(arena_size: f32) -> f32 {
        arena_size - HITBOX_SIZE
    }

    /// Advance by one tick of velocity and clamp into the arena
    pub fn advance(kin: &mut Kinematics, arena_size: f32) {
        let max = Self::max_coord(arena_size);
        kin.x = (kin.x + kin.vx).clamp(0.0, max);
        kin.y = (kin.y + kin.vy).clamp(0.0, max);
    }

    /// Run one movement step over the registry.
    /// Returns the ids of bullets removed this step.
    pub fn update(registry: &mut Registry, arena_size: f32) -> Vec<EntityId> {
        let obstacles: Vec<Rect> = registry.obstacles().map(|(_, o)| o.hitbox()).collect();
        let mut spent = Vec::new();

        for (id, entity) in registry.iter_mut() {
            match entity {
                Entity::Obstacle(_) => {}
                Entity::Bullet(bullet) => {
                    // Bullets slide along the walls like players do
                    Self::advance(&mut bullet.kinematics, arena_size);
                    let hitbox = bullet.hitbox();
                    if obstacles.iter().any(|o| hitbox.overlaps(o)) {
                        trace!(bullet_id = %id, "Bullet hit obstacle");
                        spent.push(id.clone());
                    }
                }
                Entity::Player(player) => {
                    let before = player.kinematics.position();
                    Self::advance(&mut player.kinematics, arena_size);
                    let hitbox = player.hitbox();
                    if obstacles.iter().any(|o| hitbox.overlaps(o)) {
                        // Back out the step and stop dead until the next move command
                        player.kinematics.x = before.0;
                        player.kinematics.y = before.1;
                        player.kinematics.stop();
                        trace!(player_id = %id, "Player blocked by obstacle");
                    }
                }
            }
        }

        for id in &spent {
            registry.remove(id);
        }
        spent
    }
}
