//! Component records attached to arena entities

/// Side length of the square hitbox shared by players and bullets
pub const HITBOX_SIZE: f32 = 20.0;

/// Starting hit points for a player
pub const STARTING_HP: i32 = 10;

/// Starting armor for a player
pub const STARTING_ARMOR: i32 = 5;

/// Movement speed applied by directional commands
pub const PLAYER_SPEED: f32 = 5.0;

/// Bullet travel speed in units per tick
pub const BULLET_SPEED: f32 = 10.0;

/// Default time between shots (seconds)
pub const SHOT_COOLDOWN_SECS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub hp: i32,
}

impl Health {
    pub fn new(hp: i32) -> Self {
        Self { hp }
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(STARTING_HP)
    }
}

/// Position, velocity and the speed scalar used by move commands.
/// Velocity is expressed in arena units per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub speed: f32,
}

impl Kinematics {
    pub fn new(x: f32, y: f32, vx: f32, vy: f32, speed: f32) -> Self {
        Self { x, y, vx, vy, speed }
    }

    /// Static body: no velocity and no speed
    pub fn fixed(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0, 0.0, 0.0)
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn stop(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combat {
    pub cooldown_secs: f64,
    /// Simulation time of the last shot, `None` until the first one
    pub last_shot: Option<f64>,
}

impl Combat {
    pub fn new(cooldown_secs: f64) -> Self {
        Self {
            cooldown_secs,
            last_shot: None,
        }
    }

    pub fn can_fire(&self, now: f64) -> bool {
        match self.last_shot {
            None => true,
            Some(last) => now - last >= self.cooldown_secs,
        }
    }
}

impl Default for Combat {
    fn default() -> Self {
        Self::new(SHOT_COOLDOWN_SECS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armor {
    pub value: i32,
    pub is_blocking: bool,
}

impl Armor {
    pub fn new(value: i32) -> Self {
        Self {
            value,
            is_blocking: false,
        }
    }

    /// True when the next hit is taken by the armor instead of health
    pub fn absorbs(&self) -> bool {
        self.is_blocking && self.value > 0
    }
}

impl Default for Armor {
    fn default() -> Self {
        Self::new(STARTING_ARMOR)
    }
}
