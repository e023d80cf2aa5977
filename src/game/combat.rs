//! Combat system - bullet hits, armor absorption and damage

use tracing::debug;

use super::components::{Kinematics, HITBOX_SIZE};
use super::entity::{EntityId, Player, Registry};

/// How a hit was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Blocked: armor lost a point, health untouched
    Absorbed,
    /// Health lost a point
    Damaged,
}

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub bullet_id: EntityId,
    pub shooter_id: EntityId,
    pub target_id: EntityId,
    pub outcome: HitOutcome,
}

/// Combat system for resolving bullets against players
pub struct CombatSystem;

impl CombatSystem {
    /// Proximity test used for bullet hits.
    ///
    /// Compares anchor points on both axes and ignores the target's size,
    /// unlike the box intersection the movement step uses for obstacles.
    pub fn in_proximity(bullet: &Kinematics, player: &Kinematics) -> bool {
        (bullet.x - player.x).abs() < HITBOX_SIZE && (bullet.y - player.y).abs() < HITBOX_SIZE
    }

    /// Apply one hit to a player
    pub fn apply_hit(player: &mut Player) -> HitOutcome {
        if player.armor.absorbs() {
            player.armor.value -= 1;
            HitOutcome::Absorbed
        } else {
            player.health.hp -= 1;
            HitOutcome::Damaged
        }
    }

    /// Resolve every bullet against every player except its owner.
    /// Each bullet hits at most one player and is removed on hit.
    pub fn update(registry: &mut Registry) -> Vec<HitResult> {
        let mut hits = Vec::new();

        for (bullet_id, bullet) in registry.bullets() {
            let target = registry
                .players()
                .filter(|(player_id, _)| **player_id != bullet.owner)
                .find(|(_, player)| Self::in_proximity(&bullet.kinematics, &player.kinematics));

            if let Some((target_id, _)) = target {
                hits.push(HitResult {
                    bullet_id: bullet_id.clone(),
                    shooter_id: bullet.owner.clone(),
                    target_id: target_id.clone(),
                    outcome: HitOutcome::Damaged,
                });
            }
        }

        for hit in hits.iter_mut() {
            registry.remove(&hit.bullet_id);
            if let Some(target) = registry.player_mut(&hit.target_id) {
                hit.outcome = Self::apply_hit(target);
                debug!(
                    shooter_id = %hit.shooter_id,
                    target_id = %hit.target_id,
                    outcome = ?hit.outcome,
                    hp = target.health.hp,
                    armor = target.armor.value,
                    "Bullet hit player"
                );
            }
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{Entity, EntityKind};
    use crate::game::physics::Rect;

    fn arena(target: Player) -> Registry {
        let mut registry = Registry::new();
        registry.insert("player_1".into(), Entity::Player(Player::spawn(50.0, 150.0)));
        registry.insert("player_2".into(), Entity::Player(target));
        registry
    }

    fn bullet_at(registry: &mut Registry, owner: &str, x: f32, y: f32) -> EntityId {
        registry.spawn_bullet(owner, Kinematics::new(x, y, 10.0, 0.0, 10.0))
    }

    #[test]
    fn blocking_player_loses_armor_not_health() {
        let mut target = Player::spawn(200.0, 150.0);
        target.armor.is_blocking = true;
        let mut registry = arena(target);
        let bullet = bullet_at(&mut registry, "player_1", 195.0, 155.0);

        let hits = CombatSystem::update(&mut registry);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].outcome, HitOutcome::Absorbed);
        let p = registry.player("player_2").unwrap();
        assert_eq!(p.armor.value, 4);
        assert_eq!(p.health.hp, 10);
        assert!(!registry.contains(&bullet));
    }

    #[test]
    fn exhausted_armor_falls_through_to_health() {
        let mut target = Player::spawn(200.0, 150.0);
        target.armor.is_blocking = true;
        target.armor.value = 0;
        let mut registry = arena(target);
        bullet_at(&mut registry, "player_1", 200.0, 150.0);

        CombatSystem::update(&mut registry);

        let p = registry.player("player_2").unwrap();
        assert_eq!(p.armor.value, 0);
        assert_eq!(p.health.hp, 9);
    }

    #[test]
    fn unblocked_player_loses_one_health() {
        let mut registry = arena(Player::spawn(200.0, 150.0));
        let bullet = bullet_at(&mut registry, "player_1", 210.0, 140.0);

        let hits = CombatSystem::update(&mut registry);

        assert_eq!(hits[0].outcome, HitOutcome::Damaged);
        assert_eq!(hits[0].target_id, "player_2");
        let p = registry.player("player_2").unwrap();
        assert_eq!(p.health.hp, 9);
        assert_eq!(p.armor.value, 5);
        assert!(!registry.contains(&bullet));
    }

    #[test]
    fn owner_is_never_hit_by_own_bullet() {
        let mut registry = arena(Player::spawn(300.0, 300.0));
        let bullet = bullet_at(&mut registry, "player_1", 60.0, 160.0);

        let hits = CombatSystem::update(&mut registry);

        assert!(hits.is_empty());
        assert!(registry.contains(&bullet));
        assert_eq!(registry.player("player_1").unwrap().health.hp, 10);
    }

    #[test]
    fn bullet_hits_at_most_one_player() {
        let mut registry = Registry::new();
        registry.insert("player_1".into(), Entity::Player(Player::spawn(0.0, 0.0)));
        registry.insert("player_2".into(), Entity::Player(Player::spawn(200.0, 150.0)));
        registry.insert("player_3".into(), Entity::Player(Player::spawn(205.0, 150.0)));
        bullet_at(&mut registry, "player_1", 202.0, 150.0);

        let hits = CombatSystem::update(&mut registry);

        assert_eq!(hits.len(), 1);
        let total_hp: i32 = registry.players().map(|(_, p)| p.health.hp).sum();
        assert_eq!(total_hp, 29);
        assert_eq!(registry.count(EntityKind::Bullet), 0);
    }

    #[test]
    fn two_bullets_on_one_player_both_count() {
        let mut target = Player::spawn(200.0, 150.0);
        target.armor.is_blocking = true;
        target.armor.value = 1;
        let mut registry = arena(target);
        bullet_at(&mut registry, "player_1", 200.0, 150.0);
        bullet_at(&mut registry, "player_1", 201.0, 150.0);

        let hits = CombatSystem::update(&mut registry);

        assert_eq!(hits.len(), 2);
        let p = registry.player("player_2").unwrap();
        assert_eq!(p.armor.value, 0);
        assert_eq!(p.health.hp, 9);
    }

    #[test]
    fn proximity_ignores_target_size() {
        // For two 20x20 boxes the proximity window and box overlap agree
        let player = Kinematics::fixed(200.0, 150.0);
        let player_box = Rect::square(player.x, player.y, HITBOX_SIZE);
        for (x, y) in [(181.0, 150.0), (219.0, 169.0), (180.0, 150.0), (200.0, 170.0)] {
            let bullet = Kinematics::fixed(x, y);
            let bullet_box = Rect::square(x, y, HITBOX_SIZE);
            assert_eq!(
                CombatSystem::in_proximity(&bullet, &player),
                bullet_box.overlaps(&player_box)
            );
        }

        // The proximity window never grows with the target, unlike the
        // movement step's box test against a wide obstacle
        let wide_target = Rect::new(200.0, 150.0, 50.0, 50.0);
        let far_bullet = Kinematics::fixed(225.0, 160.0);
        assert!(Rect::square(far_bullet.x, far_bullet.y, HITBOX_SIZE).overlaps(&wide_target));
        assert!(!CombatSystem::in_proximity(&far_bullet, &player));
    }
}
