//! Session engine - owns the registry and drives one duel

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, StateSnapshot};

use super::combat::CombatSystem;
use super::command::{CommandOutcome, CommandSystem};
use super::components::HITBOX_SIZE;
use super::entity::{Entity, EntityId, Obstacle, Player, Registry};
use super::physics::{PhysicsSystem, Rect};
use super::snapshot::SnapshotBuilder;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No players, nothing simulated
    Idle,
    /// Two players assigned, systems tick
    Running,
    /// A player is defeated; frozen until `end`
    Over,
}

/// Fixed parameters of the arena
#[derive(Debug, Clone)]
pub struct SessionRules {
    pub arena_size: f32,
    pub tick_rate: u32,
    pub spawn_points: [(f32, f32); 2],
    pub obstacle_count: usize,
    /// Inclusive range for obstacle x/y
    pub obstacle_position: (u32, u32),
    /// Inclusive range for obstacle width/height
    pub obstacle_size: (u32, u32),
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            arena_size: 400.0,
            tick_rate: 60,
            spawn_points: [(50.0, 150.0), (350.0, 150.0)],
            obstacle_count: 5,
            obstacle_position: (50, 350),
            obstacle_size: (20, 50),
        }
    }
}

/// Placement of one obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleSpec {
    pub x: f32,
    pub y: f32,
    pub width: u32,
    pub height: u32,
}

impl ObstacleSpec {
    pub fn new(x: f32, y: f32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    fn hitbox(&self) -> Rect {
        Rect::new(self.x, self.y, self.width as f32, self.height as f32)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A session is already in progress")]
    AlreadyRunning,

    #[error("A session needs two distinct players, got {0} twice")]
    DuplicatePlayer(EntityId),
}

/// Re-rolls allowed per obstacle before accepting a spawn overlap
const OBSTACLE_REROLLS: usize = 16;

/// One two-player duel and everything in it
pub struct Session {
    rules: SessionRules,
    registry: Registry,
    participants: Vec<EntityId>,
    running: bool,
    id: Option<Uuid>,
    ticks: u64,
    pending: VecDeque<(EntityId, ClientMsg)>,
    rng: ChaCha8Rng,
}

impl Session {
    pub fn new(rules: SessionRules, seed: u64) -> Self {
        Self {
            rules,
            registry: Registry::new(),
            participants: Vec::new(),
            running: false,
            id: None,
            ticks: 0,
            pending: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn participants(&self) -> &[EntityId] {
        &self.participants
    }

    /// Log correlation id of the current session
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulation clock in seconds since `start`
    pub fn clock(&self) -> f64 {
        self.ticks as f64 / self.rules.tick_rate as f64
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.running {
            SessionPhase::Idle
        } else if self.is_over() {
            SessionPhase::Over
        } else {
            SessionPhase::Running
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase() == SessionPhase::Running
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.participants.iter().any(|p| p == player_id)
    }

    /// Start a duel with a random obstacle layout
    pub fn start(&mut self, player1: EntityId, player2: EntityId) -> Result<(), SessionError> {
        self.check_can_start(&player1, &player2)?;
        let layout = self.random_layout();
        self.begin(player1, player2, layout);
        Ok(())
    }

    /// Start a duel with a fixed obstacle layout
    pub fn start_with_obstacles(
        &mut self,
        player1: EntityId,
        player2: EntityId,
        obstacles: Vec<ObstacleSpec>,
    ) -> Result<(), SessionError> {
        self.check_can_start(&player1, &player2)?;
        self.begin(player1, player2, obstacles);
        Ok(())
    }

    fn check_can_start(&self, player1: &str, player2: &str) -> Result<(), SessionError> {
        if self.running {
            return Err(SessionError::AlreadyRunning);
        }
        if player1 == player2 {
            return Err(SessionError::DuplicatePlayer(player1.to_string()));
        }
        Ok(())
    }

    fn begin(&mut self, player1: EntityId, player2: EntityId, obstacles: Vec<ObstacleSpec>) {
        self.registry.clear();
        self.pending.clear();
        self.ticks = 0;

        let [(x1, y1), (x2, y2)] = self.rules.spawn_points;
        self.registry
            .insert(player1.clone(), Entity::Player(Player::spawn(x1, y1)));
        self.registry
            .insert(player2.clone(), Entity::Player(Player::spawn(x2, y2)));

        for (i, spec) in obstacles.iter().enumerate() {
            self.registry.insert(
                format!("obs_{i}"),
                Entity::Obstacle(Obstacle::new(spec.x, spec.y, spec.width, spec.height)),
            );
        }

        let id = Uuid::new_v4();
        self.id = Some(id);
        self.participants = vec![player1, player2];
        self.running = true;

        info!(
            session_id = %id,
            player1 = %self.participants[0],
            player2 = %self.participants[1],
            obstacles = obstacles.len(),
            "Session started"
        );
    }

    /// Generate obstacles, re-rolling any that would cover a spawn point
    fn random_layout(&mut self) -> Vec<ObstacleSpec> {
        let (pos_min, pos_max) = self.rules.obstacle_position;
        let (size_min, size_max) = self.rules.obstacle_size;
        let spawns: Vec<Rect> = self
            .rules
            .spawn_points
            .iter()
            .map(|&(x, y)| Rect::square(x, y, HITBOX_SIZE))
            .collect();

        let mut layout = Vec::with_capacity(self.rules.obstacle_count);
        for _ in 0..self.rules.obstacle_count {
            let mut spec = self.roll_obstacle(pos_min, pos_max, size_min, size_max);
            let mut attempts = 0;
            while spawns.iter().any(|s| s.overlaps(&spec.hitbox())) && attempts < OBSTACLE_REROLLS {
                spec = self.roll_obstacle(pos_min, pos_max, size_min, size_max);
                attempts += 1;
            }
            layout.push(spec);
        }
        layout
    }

    fn roll_obstacle(&mut self, pos_min: u32, pos_max: u32, size_min: u32, size_max: u32) -> ObstacleSpec {
        ObstacleSpec {
            x: self.rng.gen_range(pos_min..=pos_max) as f32,
            y: self.rng.gen_range(pos_min..=pos_max) as f32,
            width: self.rng.gen_range(size_min..=size_max),
            height: self.rng.gen_range(size_min..=size_max),
        }
    }

    /// Queue a command for the next tick.
    /// Returns false (and drops it) unless the session is running and the
    /// sender is one of its players.
    pub fn submit(&mut self, player_id: &str, msg: ClientMsg) -> bool {
        if !self.is_running() || !self.is_participant(player_id) {
            return false;
        }
        self.pending.push_back((player_id.to_string(), msg));
        true
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }

        let now = self.clock();
        while let Some((player_id, msg)) = self.pending.pop_front() {
            if let CommandOutcome::UnknownPlayer =
                CommandSystem::apply(&mut self.registry, &player_id, &msg, now)
            {
                warn!(player_id = %player_id, "Participant has no player entity, command skipped");
            }
        }

        PhysicsSystem::update(&mut self.registry, self.rules.arena_size);

        let hits = CombatSystem::update(&mut self.registry);
        if !hits.is_empty() {
            debug!(tick = self.ticks, hits = hits.len(), "Combat resolved");
        }

        self.ticks += 1;
    }

    /// True when any participant has been defeated
    pub fn is_over(&self) -> bool {
        self.participants
            .iter()
            .any(|id| match self.registry.player(id) {
                Some(p) => p.health.is_defeated(),
                None => false,
            })
    }

    /// Sole surviving participant, once the game is over
    pub fn winner(&self) -> Option<EntityId> {
        if !self.is_over() {
            return None;
        }
        let mut alive = self.participants.iter().filter(|id| {
            self.registry
                .player(id)
                .map(|p| !p.health.is_defeated())
                .unwrap_or(false)
        });
        match (alive.next(), alive.next()) {
            (Some(id), None) => Some(id.clone()),
            _ => None,
        }
    }

    /// Tear the session down and return to idle
    pub fn end(&mut self) {
        if let Some(id) = self.id.take() {
            info!(session_id = %id, ticks = self.ticks, "Session ended");
        }
        self.running = false;
        self.participants.clear();
        self.registry.clear();
        self.pending.clear();
        self.ticks = 0;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        SnapshotBuilder::build(
            &self.registry,
            &self.participants,
            self.running,
            self.is_over(),
            self.winner(),
        )
    }
}
