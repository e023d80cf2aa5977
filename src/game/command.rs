//! Command system - turns player commands into component changes

use tracing::trace;

use crate::ws::protocol::{ClientMsg, Direction};

use super::components::{Kinematics, BULLET_SPEED, HITBOX_SIZE};
use super::entity::{EntityId, Registry};

/// Result of applying one command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied,
    /// A bullet was spawned under this id
    Fired(EntityId),
    /// Shot rejected, cooldown still running
    OnCooldown,
    /// The id does not name a live player
    UnknownPlayer,
}

pub struct CommandSystem;

impl CommandSystem {
    /// Apply a command for `player_id` at simulation time `now` (seconds)
    pub fn apply(registry: &mut Registry, player_id: &str, msg: &ClientMsg, now: f64) -> CommandOutcome {
        let Some(player) = registry.player_mut(player_id) else {
            return CommandOutcome::UnknownPlayer;
        };

        match *msg {
            ClientMsg::Move { direction } => {
                let kin = &mut player.kinematics;
                match direction {
                    Direction::Up => kin.vy = -kin.speed,
                    Direction::Down => kin.vy = kin.speed,
                    Direction::Left => kin.vx = -kin.speed,
                    Direction::Right => kin.vx = kin.speed,
                    Direction::StopX => kin.vx = 0.0,
                    Direction::StopY => kin.vy = 0.0,
                }
                CommandOutcome::Applied
            }
            ClientMsg::Shoot { angle } => {
                if !player.combat.can_fire(now) {
                    return CommandOutcome::OnCooldown;
                }
                player.combat.last_shot = Some(now);

                // Bullets leave from the centre of the shooter's hitbox
                let offset = HITBOX_SIZE / 2.0;
                let kinematics = Kinematics::new(
                    player.kinematics.x + offset,
                    player.kinematics.y + offset,
                    BULLET_SPEED * angle.cos(),
                    BULLET_SPEED * angle.sin(),
                    BULLET_SPEED,
                );
                let bullet_id = registry.spawn_bullet(player_id, kinematics);
                trace!(player_id, bullet_id = %bullet_id, angle, "Shot fired");
                CommandOutcome::Fired(bullet_id)
            }
            ClientMsg::Block { active } => {
                player.armor.is_blocking = active;
                CommandOutcome::Applied
            }
        }
    }
}
