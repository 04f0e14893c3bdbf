//! Error types for the room layer.

use snakepit_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room is full; no more player slots available.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is not in this room (or in no room at all).
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// The room's phase doesn't allow this operation, e.g. steering while
    /// the game is not running.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
