//! Entity variants and the registry that owns them

use std::collections::BTreeMap;

use super::components::{Armor, Combat, Health, Kinematics, HITBOX_SIZE, PLAYER_SPEED};
use super::physics::Rect;

/// Entity identifier, unique within a session
pub type EntityId = String;

/// Entity variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Obstacle,
    Bullet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub health: Health,
    pub kinematics: Kinematics,
    pub combat: Combat,
    pub armor: Armor,
}

impl Player {
    pub fn spawn(x: f32, y: f32) -> Self {
        Self {
            health: Health::default(),
            kinematics: Kinematics::new(x, y, 0.0, 0.0, PLAYER_SPEED),
            combat: Combat::default(),
            armor: Armor::default(),
        }
    }

    pub fn hitbox(&self) -> Rect {
        Rect::square(self.kinematics.x, self.kinematics.y, HITBOX_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub kinematics: Kinematics,
    pub width: u32,
    pub height: u32,
}

impl Obstacle {
    pub fn new(x: f32, y: f32, width: u32, height: u32) -> Self {
        Self {
            kinematics: Kinematics::fixed(x, y),
            width,
            height,
        }
    }

    pub fn hitbox(&self) -> Rect {
        Rect::new(
            self.kinematics.x,
            self.kinematics.y,
            self.width as f32,
            self.height as f32,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub kinematics: Kinematics,
    /// Player that fired the bullet; never hit by it
    pub owner: EntityId,
}

impl Bullet {
    pub fn hitbox(&self) -> Rect {
        Rect::square(self.kinematics.x, self.kinematics.y, HITBOX_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Player(Player),
    Obstacle(Obstacle),
    Bullet(Bullet),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Obstacle(_) => EntityKind::Obstacle,
            Entity::Bullet(_) => EntityKind::Bullet,
        }
    }

    pub fn kinematics(&self) -> &Kinematics {
        match self {
            Entity::Player(p) => &p.kinematics,
            Entity::Obstacle(o) => &o.kinematics,
            Entity::Bullet(b) => &b.kinematics,
        }
    }

    pub fn hitbox(&self) -> Rect {
        match self {
            Entity::Player(p) => p.hitbox(),
            Entity::Obstacle(o) => o.hitbox(),
            Entity::Bullet(b) => b.hitbox(),
        }
    }
}

/// All live entities of a session, keyed by id.
///
/// Backed by an ordered map so every system walks entities in the same
/// order on every tick.
#[derive(Debug, Default)]
pub struct Registry {
    entities: BTreeMap<EntityId, Entity>,
    next_bullet: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EntityId, entity: Entity) {
        self.entities.insert(id, entity);
    }

    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        match self.entities.get(id) {
            Some(Entity::Player(p)) => Some(p),
            _ => None,
        }
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        match self.entities.get_mut(id) {
            Some(Entity::Player(p)) => Some(p),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut Entity)> {
        self.entities.iter_mut()
    }

    pub fn players(&self) -> impl Iterator<Item = (&EntityId, &Player)> {
        self.entities.iter().filter_map(|(id, e)| match e {
            Entity::Player(p) => Some((id, p)),
            _ => None,
        })
    }

    pub fn bullets(&self) -> impl Iterator<Item = (&EntityId, &Bullet)> {
        self.entities.iter().filter_map(|(id, e)| match e {
            Entity::Bullet(b) => Some((id, b)),
            _ => None,
        })
    }

    pub fn obstacles(&self) -> impl Iterator<Item = (&EntityId, &Obstacle)> {
        self.entities.iter().filter_map(|(id, e)| match e {
            Entity::Obstacle(o) => Some((id, o)),
            _ => None,
        })
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind() == kind).count()
    }

    /// Add a bullet under a fresh `bullet_<n>` id and return the id
    pub fn spawn_bullet(&mut self, owner: &str, kinematics: Kinematics) -> EntityId {
        let id = format!("bullet_{}", self.next_bullet);
        self.next_bullet += 1;
        self.entities.insert(
            id.clone(),
            Entity::Bullet(Bullet {
                kinematics,
                owner: owner.to_string(),
            }),
        );
        id
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop every entity and restart bullet numbering
    pub fn clear(&mut self) {
        self.entities.clear();
        self.next_bullet = 0;
    }
}
