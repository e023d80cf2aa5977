//! Matchmaking and the arena loop

pub mod queue;
pub mod service;

pub use queue::WaitingQueue;
pub use service::{ArenaError, ArenaHandle, ArenaService, ArenaStatus, Connection};
