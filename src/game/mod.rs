//! Game simulation modules

pub mod combat;
pub mod command;
pub mod components;
pub mod entity;
pub mod physics;
pub mod session;
pub mod snapshot;

pub use entity::{Entity, EntityId, EntityKind, Registry};
pub use session::{ObstacleSpec, Session, SessionError, SessionPhase, SessionRules};
pub use snapshot::SnapshotStats;
