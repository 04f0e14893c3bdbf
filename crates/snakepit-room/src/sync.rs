//! Snapshot shaping and dirty-gated updates.

use snakepit_protocol::{Roster, ServerEvent, Snapshot};

use crate::state::Room;

impl Room {
    /// Full wire snapshot of the room.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self.roster(),
            food: self.food.clone(),
            running: self.phase.is_running(),
            ticks_since_start: self.ticks_since_start,
            grace_seconds_remaining: self.grace_seconds_remaining(),
        }
    }

    /// Players keyed by identity.
    pub fn roster(&self) -> Roster {
        self.players.iter().map(|p| (p.id, p.clone())).collect()
    }

    /// Whole seconds of grace left in the current run (0 when not running).
    pub fn grace_seconds_remaining(&self) -> u32 {
        if self.phase.is_running() {
            self.config.grace_seconds_remaining(self.ticks_since_start)
        } else {
            0
        }
    }

    /// Returns a `gameUpdate` if anything changed since the last one and
    /// clears the dirty flag. Returns `None` otherwise.
    pub fn flush_update(&mut self) -> Option<ServerEvent> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        Some(ServerEvent::GameUpdate(self.snapshot()))
    }
}
