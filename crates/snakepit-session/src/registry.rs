//! The session registry: identity -> room.
//!
//! `SessionRegistry` is a plain map and is NOT thread-safe by itself. The
//! room manager owns it behind a mutex.

use std::collections::HashMap;

use snakepit_protocol::{PlayerId, RoomId};

/// Maps each connected player to the room they are in.
///
/// A player is in at most one room at a time. Registering a player again
/// replaces the old entry and hands it back, so the caller can leave the
/// previous room first.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    rooms: HashMap<PlayerId, RoomId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `player_id` is in `room_id`.
    ///
    /// Returns the room the player was previously registered in, if any.
    pub fn register(&mut self, player_id: PlayerId, room_id: RoomId) -> Option<RoomId> {
        tracing::debug!(%player_id, %room_id, "session registered");
        self.rooms.insert(player_id, room_id)
    }

    /// Returns the room `player_id` is in, if any.
    pub fn lookup(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.rooms.get(player_id).cloned()
    }

    /// Forgets `player_id`. Returns the room it was registered in.
    ///
    /// Unregistering an unknown player is a no-op.
    pub fn unregister(&mut self, player_id: &PlayerId) -> Option<RoomId> {
        let removed = self.rooms.remove(player_id);
        if let Some(room_id) = &removed {
            tracing::debug!(%player_id, %room_id, "session unregistered");
        }
        removed
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no players are registered.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomId {
        RoomId::new(id)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SessionRegistry::new();
        assert!(registry.register(PlayerId(1), room("alpha")).is_none());

        assert_eq!(registry.lookup(&PlayerId(1)), Some(room("alpha")));
        assert_eq!(registry.lookup(&PlayerId(2)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_again_returns_previous_room() {
        let mut registry = SessionRegistry::new();
        registry.register(PlayerId(1), room("alpha"));

        let previous = registry.register(PlayerId(1), room("beta"));

        assert_eq!(previous, Some(room("alpha")));
        assert_eq!(registry.lookup(&PlayerId(1)), Some(room("beta")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = SessionRegistry::new();
        registry.register(PlayerId(1), room("alpha"));

        assert_eq!(registry.unregister(&PlayerId(1)), Some(room("alpha")));
        assert_eq!(registry.unregister(&PlayerId(1)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_players_are_independent() {
        let mut registry = SessionRegistry::new();
        registry.register(PlayerId(1), room("alpha"));
        registry.register(PlayerId(2), room("alpha"));
        registry.register(PlayerId(3), room("beta"));

        registry.unregister(&PlayerId(2));

        assert_eq!(registry.lookup(&PlayerId(1)), Some(room("alpha")));
        assert_eq!(registry.lookup(&PlayerId(3)), Some(room("beta")));
        assert_eq!(registry.len(), 2);
    }
}
