//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::{EntityId, EntityKind};

/// Movement directions accepted by the move command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    /// Zero horizontal velocity
    StopX,
    /// Zero vertical velocity
    StopY,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Set velocity along one axis
    Move { direction: Direction },

    /// Fire a bullet
    Shoot {
        /// Aim direction in radians
        angle: f32,
    },

    /// Raise or lower the shield
    Block { active: bool },
}

impl ClientMsg {
    /// Parse and validate an inbound text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMsg = serde_json::from_str(text)?;
        if let ClientMsg::Shoot { angle } = msg {
            if !angle.is_finite() {
                return Err(ProtocolError::InvalidAngle);
            }
        }
        Ok(msg)
    }
}

/// Inbound message rejected at the boundary
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Shoot angle must be a finite number")]
    InvalidAngle,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMsg {
    /// Sent once after connection
    Welcome(Welcome),

    /// Game state (sent every tick while a session is running)
    State(StateSnapshot),
}

#[derive(Debug, Clone, Serialize)]
pub struct Welcome {
    /// Always "welcome"
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub player_id: EntityId,
}

impl Welcome {
    pub fn new(player_id: EntityId) -> Self {
        Self {
            kind: "welcome",
            player_id,
        }
    }
}

/// Full session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub entities: BTreeMap<EntityId, EntitySnapshot>,
    pub game_over: bool,
    pub is_running: bool,
    pub players: Vec<EntityId>,
    /// Surviving player once the game is over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<EntityId>,
}

/// One entity in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    /// 0 for non-players
    pub hp: i32,
    /// 0 for non-players
    pub armor: i32,
    pub is_blocking: bool,
    pub width: u32,
    pub height: u32,
}
