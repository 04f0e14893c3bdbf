//! Rooms for Snakepit: state, simulation, and lifecycle.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`Room`] state and the tick timer driving it.
//!
//! # Key types
//!
//! - [`Room`]: players, food, and phase, with synchronous transitions
//!   (`join`, `start_game`, `tick`, ...) that return an [`Outcome`]
//! - [`RoomManager`]: creates/destroys rooms, routes players
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomPhase`]: lifecycle state machine
//! - [`RoomConfig`]: game constants (grid, speeds, limits)

mod config;
mod error;
mod manager;
mod room;
mod sim;
mod state;
mod sync;

pub use config::{ANCHORS, MAX_NAME_CHARS, PLAYER_COLORS, RoomConfig, RoomPhase};
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{LeaveOutcome, PlayerCommand, PlayerSender, RoomHandle, RoomInfo};
pub use state::{JoinKind, Outcome, Room, Scheduled};
