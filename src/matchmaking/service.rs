//! Arena service - pairs players, drives the tick loop and fans out state
//!
//! A single task owns the session, the connection table and the waiting
//! queue. Socket tasks only talk to it through [`ArenaHandle`], so every
//! mutation of the simulation happens on that one task and snapshots are
//! always taken between whole ticks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::game::{EntityId, Session, SessionPhase, SessionRules, SnapshotStats};
use crate::util::time::{tick_duration, Timer};
use crate::ws::protocol::{ClientMsg, ServerMsg, Welcome};

use super::queue::WaitingQueue;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events delivered to the arena task
#[derive(Debug)]
pub enum ArenaEvent {
    Connected {
        player_id: EntityId,
        outbound: mpsc::Sender<String>,
    },
    Command {
        player_id: EntityId,
        msg: ClientMsg,
    },
    Disconnected {
        player_id: EntityId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("Arena service has shut down")]
    Closed,
}

/// A registered connection: its player id and the frames queued for it
#[derive(Debug)]
pub struct Connection {
    pub player_id: EntityId,
    pub outbound_rx: mpsc::Receiver<String>,
}

/// Point-in-time view of the arena for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ArenaStatus {
    pub phase: SessionPhase,
    pub connections: usize,
    pub queued: usize,
    pub players: Vec<EntityId>,
    pub ticks: u64,
    #[serde(flatten)]
    pub stats: SnapshotStats,
}

impl Default for ArenaStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            connections: 0,
            queued: 0,
            players: Vec::new(),
            ticks: 0,
            stats: SnapshotStats::default(),
        }
    }
}

/// Cloneable handle used by socket tasks
#[derive(Clone)]
pub struct ArenaHandle {
    events_tx: mpsc::Sender<ArenaEvent>,
    next_player: Arc<AtomicU64>,
    outbound_buffer: usize,
    status: Arc<RwLock<ArenaStatus>>,
}

impl ArenaHandle {
    /// Register a new socket under a fresh player id
    pub async fn connect(&self) -> Result<Connection, ArenaError> {
        let n = self.next_player.fetch_add(1, Ordering::Relaxed);
        let player_id = format!("player_{n}");
        let (outbound, outbound_rx) = mpsc::channel(self.outbound_buffer);

        self.events_tx
            .send(ArenaEvent::Connected {
                player_id: player_id.clone(),
                outbound,
            })
            .await
            .map_err(|_| ArenaError::Closed)?;

        Ok(Connection {
            player_id,
            outbound_rx,
        })
    }

    /// Forward a parsed command from a socket
    pub async fn command(&self, player_id: &str, msg: ClientMsg) -> Result<(), ArenaError> {
        self.events_tx
            .send(ArenaEvent::Command {
                player_id: player_id.to_string(),
                msg,
            })
            .await
            .map_err(|_| ArenaError::Closed)
    }

    /// Report a closed socket. Unknown ids are ignored by the arena.
    pub async fn disconnect(&self, player_id: &str) {
        let event = ArenaEvent::Disconnected {
            player_id: player_id.to_string(),
        };
        if self.events_tx.send(event).await.is_err() {
            debug!(player_id, "Arena already shut down");
        }
    }

    pub fn status(&self) -> ArenaStatus {
        self.status.read().clone()
    }
}

struct ConnectionSlot {
    /// Connection order, used when re-seeding the queue
    seq: u64,
    outbound: mpsc::Sender<String>,
}

/// The arena task state
pub struct ArenaService {
    session: Session,
    queue: WaitingQueue,
    connections: HashMap<EntityId, ConnectionSlot>,
    next_seq: u64,
    /// Sockets whose outbound queue failed during a broadcast
    dropped: Vec<EntityId>,
    events_rx: mpsc::Receiver<ArenaEvent>,
    tick_rate: u32,
    stats: SnapshotStats,
    status: Arc<RwLock<ArenaStatus>>,
}

impl ArenaService {
    pub fn new(config: &Config) -> (Self, ArenaHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let status = Arc::new(RwLock::new(ArenaStatus::default()));

        let rules = SessionRules {
            tick_rate: config.tick_rate,
            obstacle_count: config.obstacle_count,
            ..SessionRules::default()
        };
        let seed = config.obstacle_seed.unwrap_or_else(rand::random);

        let handle = ArenaHandle {
            events_tx,
            next_player: Arc::new(AtomicU64::new(1)),
            outbound_buffer: config.outbound_buffer,
            status: status.clone(),
        };

        let service = Self {
            session: Session::new(rules, seed),
            queue: WaitingQueue::new(),
            connections: HashMap::new(),
            next_seq: 0,
            dropped: Vec::new(),
            events_rx,
            tick_rate: config.tick_rate,
            stats: SnapshotStats::default(),
            status,
        };

        (service, handle)
    }

    /// Run the fixed-rate loop until every handle is dropped
    pub async fn run(mut self) {
        let tick_budget = tick_duration(self.tick_rate);
        let mut ticker = interval(tick_budget);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_rate = self.tick_rate, "Arena loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timer = Timer::new();
                    self.on_tick();
                    let elapsed = timer.elapsed();
                    if elapsed > tick_budget {
                        warn!(elapsed_us = elapsed.as_micros() as u64, "Tick overran its budget");
                    }
                }
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }

            self.reap_dropped();
            self.publish_status();
        }

        self.session.end();
        info!("Arena loop stopped");
    }

    fn handle_event(&mut self, event: ArenaEvent) {
        match event {
            ArenaEvent::Connected {
                player_id,
                outbound,
            } => self.handle_connect(player_id, outbound),
            ArenaEvent::Command { player_id, msg } => {
                if !self.session.submit(&player_id, msg) {
                    trace!(player_id = %player_id, "Command ignored, not in a running session");
                }
            }
            ArenaEvent::Disconnected { player_id } => self.handle_disconnect(&player_id),
        }
    }

    fn handle_connect(&mut self, player_id: EntityId, outbound: mpsc::Sender<String>) {
        match serde_json::to_string(&ServerMsg::Welcome(Welcome::new(player_id.clone()))) {
            Ok(text) => {
                if outbound.try_send(text).is_err() {
                    warn!(player_id = %player_id, "Socket closed before welcome, ignoring");
                    return;
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize welcome"),
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.connections
            .insert(player_id.clone(), ConnectionSlot { seq, outbound });
        self.queue.enqueue(player_id.clone());

        info!(
            player_id = %player_id,
            connections = self.connections.len(),
            queued = self.queue.len(),
            "Player connected"
        );

        self.try_start();
    }

    fn handle_disconnect(&mut self, player_id: &str) {
        self.queue.remove(player_id);
        if self.connections.remove(player_id).is_none() {
            return;
        }

        info!(
            player_id,
            connections = self.connections.len(),
            "Player disconnected"
        );

        if self.session.phase() == SessionPhase::Idle {
            return;
        }
        // Participants always hold a connection, so this also covers the
        // last connection leaving a live session
        if self.session.is_participant(player_id) {
            self.end_session("participant disconnected");
        }
        debug_assert!(
            self.session.phase() == SessionPhase::Idle
                || self
                    .session
                    .participants()
                    .iter()
                    .all(|p| self.connections.contains_key(p)),
            "live session has a participant without a connection"
        );
    }

    /// Pair the first two waiting players if the arena is free
    fn try_start(&mut self) {
        if self.session.phase() != SessionPhase::Idle {
            return;
        }
        let Some((player1, player2)) = self.queue.try_pair() else {
            return;
        };
        if let Err(e) = self.session.start(player1, player2) {
            warn!(error = %e, "Could not start session");
        }
    }

    fn on_tick(&mut self) {
        match self.session.phase() {
            SessionPhase::Idle => return,
            SessionPhase::Running => self.session.tick(),
            SessionPhase::Over => {}
        }

        self.broadcast_state();

        if self.session.is_over() {
            info!(
                session_id = ?self.session.id(),
                winner = ?self.session.winner(),
                ticks = self.session.ticks(),
                "Game over"
            );
            self.end_session("game over");
        }
    }

    /// End the session, tell every socket, and requeue everyone still here
    fn end_session(&mut self, reason: &'static str) {
        info!(session_id = ?self.session.id(), reason, "Ending session");
        self.session.end();
        self.broadcast_state();

        let mut connected: Vec<(u64, EntityId)> = self
            .connections
            .iter()
            .filter(|(id, _)| !self.dropped.contains(*id))
            .map(|(id, slot)| (slot.seq, id.clone()))
            .collect();
        connected.sort_unstable();
        self.queue.reseed(connected.into_iter().map(|(_, id)| id));

        self.try_start();
    }

    /// Serialize the current snapshot once and queue it on every socket
    fn broadcast_state(&mut self) {
        let msg = ServerMsg::State(self.session.snapshot());
        let text = match serde_json::to_string(&msg) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to serialize snapshot");
                return;
            }
        };

        let mut delivered = 0;
        for (player_id, slot) in &self.connections {
            match slot.outbound.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(player_id = %player_id, "Outbound queue full, dropping slow socket");
                    self.dropped.push(player_id.clone());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(player_id = %player_id, "Outbound queue closed");
                    self.dropped.push(player_id.clone());
                }
            }
        }
        self.stats.record(delivered, text.len());
    }

    /// Treat sockets that failed a broadcast as disconnected
    fn reap_dropped(&mut self) {
        while let Some(player_id) = self.dropped.pop() {
            self.handle_disconnect(&player_id);
        }
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.phase = self.session.phase();
        status.connections = self.connections.len();
        status.queued = self.queue.len();
        status.players = self.session.participants().to_vec();
        status.ticks = self.session.ticks();
        status.stats = self.stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::game::EntityKind;
    use crate::ws::protocol::{Direction, StateSnapshot};

    fn test_config() -> Config {
        Config {
            obstacle_count: 0,
            ..Config::default()
        }
    }

    /// Register a socket directly on the service, bypassing the handle
    fn connect(
        service: &mut ArenaService,
        player_id: &str,
        buffer: usize,
    ) -> mpsc::Receiver<String> {
        let (outbound, rx) = mpsc::channel(buffer);
        service.handle_event(ArenaEvent::Connected {
            player_id: player_id.to_string(),
            outbound,
        });
        rx
    }

    fn drain_states(rx: &mut mpsc::Receiver<String>) -> Vec<StateSnapshot> {
        let mut states = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value.get("type").is_none() {
                states.push(serde_json::from_value(value).unwrap());
            }
        }
        states
    }

    #[test]
    fn second_connection_starts_session() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        let mut a = connect(&mut service, "player_1", 8);

        let welcome: serde_json::Value = serde_json::from_str(&a.try_recv().unwrap()).unwrap();
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["player_id"], "player_1");
        assert_eq!(service.session.phase(), SessionPhase::Idle);

        let _b = connect(&mut service, "player_2", 8);
        assert_eq!(service.session.phase(), SessionPhase::Running);
        assert_eq!(service.session.participants(), ["player_1", "player_2"]);
        assert!(service.queue.is_empty());

        service.on_tick();
        let states = drain_states(&mut a);
        assert_eq!(states.len(), 1);
        assert!(states[0].is_running);
        assert_eq!(states[0].entities.len(), 2);
    }

    #[test]
    fn commands_route_only_for_participants() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        let _a = connect(&mut service, "player_1", 8);
        let _b = connect(&mut service, "player_2", 8);
        let _c = connect(&mut service, "player_3", 8);

        service.handle_event(ArenaEvent::Command {
            player_id: "player_1".into(),
            msg: ClientMsg::Move {
                direction: Direction::Right,
            },
        });
        service.handle_event(ArenaEvent::Command {
            player_id: "player_3".into(),
            msg: ClientMsg::Shoot { angle: 0.0 },
        });
        service.on_tick();

        let registry = service.session.registry();
        assert_eq!(
            registry.player("player_1").unwrap().kinematics.position(),
            (55.0, 150.0)
        );
        assert_eq!(registry.count(EntityKind::Bullet), 0);
        assert!(registry.player("player_3").is_none());
    }

    #[test]
    fn game_over_ends_session_and_requeues_everyone() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        let mut a = connect(&mut service, "player_1", 8);
        let _b = connect(&mut service, "player_2", 8);
        let _c = connect(&mut service, "player_3", 8);

        service
            .session
            .registry_mut()
            .player_mut("player_2")
            .unwrap()
            .health
            .hp = 0;
        service.on_tick();

        let states = drain_states(&mut a);
        assert_eq!(states.len(), 2);
        assert!(states[0].game_over);
        assert_eq!(states[0].winner.as_deref(), Some("player_1"));
        assert!(!states[1].is_running);
        assert!(states[1].entities.is_empty());

        // Requeued in connection order, so the first two play again
        assert_eq!(service.session.phase(), SessionPhase::Running);
        assert_eq!(service.session.participants(), ["player_1", "player_2"]);
        assert_eq!(
            service.session.registry().player("player_2").unwrap().health.hp,
            10
        );
        assert_eq!(service.queue.iter().collect::<Vec<_>>(), ["player_3"]);
    }

    #[test]
    fn participant_disconnect_ends_session() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        let _a = connect(&mut service, "player_1", 8);
        let mut b = connect(&mut service, "player_2", 8);

        service.handle_event(ArenaEvent::Disconnected {
            player_id: "player_1".into(),
        });

        assert_eq!(service.session.phase(), SessionPhase::Idle);
        assert!(service.session.registry().is_empty());
        assert_eq!(service.queue.iter().collect::<Vec<_>>(), ["player_2"]);
        let states = drain_states(&mut b);
        assert_eq!(states.last().map(|s| s.is_running), Some(false));
    }

    #[test]
    fn spectator_disconnect_leaves_session_running() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        let _a = connect(&mut service, "player_1", 8);
        let _b = connect(&mut service, "player_2", 8);
        let _c = connect(&mut service, "player_3", 8);

        service.handle_event(ArenaEvent::Disconnected {
            player_id: "player_3".into(),
        });

        assert_eq!(service.session.phase(), SessionPhase::Running);
        assert!(service.queue.is_empty());
        assert_eq!(service.connections.len(), 2);
    }

    #[test]
    fn slow_socket_is_dropped_without_stalling_others() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        // Buffer of one is already full with the welcome frame
        let _a = connect(&mut service, "player_1", 1);
        let mut b = connect(&mut service, "player_2", 8);
        let _c = connect(&mut service, "player_3", 8);

        service.on_tick();
        assert_eq!(drain_states(&mut b).len(), 1);

        service.reap_dropped();
        assert!(!service.connections.contains_key("player_1"));
        // The survivor and the waiting player are paired straight away
        assert_eq!(service.session.phase(), SessionPhase::Running);
        assert_eq!(service.session.participants(), ["player_2", "player_3"]);
    }

    #[test]
    fn disconnected_pair_is_replaced_by_clean_session() {
        let (mut service, _handle) = ArenaService::new(&test_config());
        let _a = connect(&mut service, "player_1", 8);
        let _b = connect(&mut service, "player_2", 8);
        service.handle_event(ArenaEvent::Command {
            player_id: "player_1".into(),
            msg: ClientMsg::Shoot { angle: 1.0 },
        });
        service.on_tick();
        assert_eq!(service.session.registry().count(EntityKind::Bullet), 1);

        service.handle_event(ArenaEvent::Disconnected {
            player_id: "player_1".into(),
        });
        service.handle_event(ArenaEvent::Disconnected {
            player_id: "player_2".into(),
        });
        assert_eq!(service.session.phase(), SessionPhase::Idle);
        assert!(service.connections.is_empty());
        assert!(service.queue.is_empty());

        let mut c = connect(&mut service, "player_3", 8);
        let _d = connect(&mut service, "player_4", 8);
        service.on_tick();

        let states = drain_states(&mut c);
        let state = states.last().unwrap();
        assert!(state.is_running);
        assert_eq!(state.players, ["player_3", "player_4"]);
        assert_eq!(state.entities.len(), 2);
        assert!(state.entities.values().all(|e| e.kind == EntityKind::Player));
    }

    #[tokio::test]
    async fn handle_drives_running_loop() {
        let (service, handle) = ArenaService::new(&test_config());
        tokio::spawn(service.run());

        let mut a = handle.connect().await.unwrap();
        let b = handle.connect().await.unwrap();
        assert_ne!(a.player_id, b.player_id);

        handle
            .command(&a.player_id, ClientMsg::Shoot { angle: 0.0 })
            .await
            .unwrap();

        let saw_bullet = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(text) = a.outbound_rx.recv().await {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                let bullets = value["entities"]
                    .as_object()
                    .map(|e| e.values().filter(|v| v["type"] == "bullet").count())
                    .unwrap_or(0);
                if bullets > 0 {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(saw_bullet);

        handle.disconnect(&b.player_id).await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.status().phase != SessionPhase::Idle {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let status = handle.status();
        assert_eq!(status.connections, 1);
        assert_eq!(status.queued, 1);
        assert!(status.stats.snapshots_sent > 0);
    }
}
