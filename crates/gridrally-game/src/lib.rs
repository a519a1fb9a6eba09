//! Authoritative rules engine for the robot racing game: courses, cards,
//! the shared card economy, and the turn state machine. Pure state in,
//! events out; the server crate owns sockets and timers.

pub mod activation;
pub mod board;
pub mod cards;
pub mod config;
pub mod course;
pub mod deck;
pub mod error;
pub mod movement;
pub mod player_state;
pub mod pools;
pub mod priority;
pub mod turn;

pub use cards::CardType;
pub use config::GameRules;
pub use error::{ActionError, EngineError};
pub use turn::TurnEngine;
