//! Room configuration, lifecycle phases, and spawn layout.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use snakepit_protocol::{Direction, Position};

/// Snake colors, indexed by a player's `color_index`.
pub const PLAYER_COLORS: [&str; 3] = ["#6EE766", "#FF5252", "#42AAFF"];

/// Spawn head and initial heading per `color_index`. Every anchor faces
/// into the field so the 3-cell body trails towards the nearest wall.
pub const ANCHORS: [(Position, Direction); 3] = [
    (Position::new(6, 6), Direction::Right),
    (Position::new(24, 6), Direction::Left),
    (Position::new(15, 24), Direction::Up),
];

/// Longest display name kept after sanitizing.
pub const MAX_NAME_CHARS: usize = 16;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Game constants for a room.
///
/// `Default` holds the production values. They are not exposed as runtime
/// knobs; tests build rooms with tweaked copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum players in a room (at most one per color).
    pub max_players: usize,

    /// Maximum food items on the grid at once.
    pub max_food: usize,

    /// Time between simulation ticks.
    pub tick_interval: Duration,

    /// Time after start during which snake collisions are not evaluated.
    pub grace_period: Duration,

    /// Points per food item eaten.
    pub food_score: u32,

    /// Per-tick probability of spawning one food item.
    pub food_spawn_chance: f64,

    /// Random cells tried before food placement gives up.
    pub food_placement_attempts: u32,

    /// Delay between a food item being eaten and its replacement.
    pub replenish_delay: Duration,

    /// Seconds of countdown between `startGame` and the run actually
    /// starting. 0 starts immediately.
    pub countdown_secs: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 3,
            max_food: 3,
            tick_interval: Duration::from_millis(100),
            grace_period: Duration::from_secs(3),
            food_score: 10,
            food_spawn_chance: 0.02,
            food_placement_attempts: 100,
            replenish_delay: Duration::from_millis(200),
            countdown_secs: 0,
        }
    }
}

impl RoomConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_players` kept within `1..=PLAYER_COLORS.len()`.
    /// - `food_spawn_chance` clamped to `0.0..=1.0` (NaN becomes 0).
    /// - `tick_interval` raised to at least 1 ms.
    pub fn validated(mut self) -> Self {
        let clamped = self.max_players.clamp(1, PLAYER_COLORS.len());
        if clamped != self.max_players {
            tracing::warn!(
                max_players = self.max_players,
                clamped,
                "max_players out of range, clamping"
            );
            self.max_players = clamped;
        }
        self.food_spawn_chance = if self.food_spawn_chance.is_nan() {
            0.0
        } else {
            self.food_spawn_chance.clamp(0.0, 1.0)
        };
        self.tick_interval = self.tick_interval.max(Duration::from_millis(1));
        self
    }

    /// Length of the grace period in ticks.
    pub fn grace_ticks(&self) -> u64 {
        let tick_ms = self.tick_interval.as_millis().max(1);
        (self.grace_period.as_millis() / tick_ms) as u64
    }

    /// Length of the grace period in whole seconds, rounded up.
    pub fn grace_seconds(&self) -> u32 {
        self.grace_period.as_secs_f64().ceil() as u32
    }

    /// Whole seconds of grace left after `ticks` ticks, rounded up.
    pub fn grace_seconds_remaining(&self, ticks: u64) -> u32 {
        let remaining = self.grace_ticks().saturating_sub(ticks) as u128;
        let ms = remaining * self.tick_interval.as_millis();
        ms.div_ceil(1000) as u32
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Waiting ──startGame──→ Running ──≤1 alive──→ GameOver
///    ↑                                             │
///    └──────────────── resetGame ──────────────────┘
/// ```
///
/// `resetGame` returns to `Waiting` from any phase. A room with no players
/// is destroyed regardless of phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomPhase {
    #[default]
    Waiting,
    Running,
    GameOver,
}

impl RoomPhase {
    /// Returns `true` while the simulation is ticking.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` after a game ended and before it was reset.
    pub fn is_game_over(self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Running => write!(f, "Running"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_players, 3);
        assert_eq!(config.max_food, 3);
        assert_eq!(config.food_score, 10);
        assert_eq!(config.countdown_secs, 0);
        assert_eq!(config.grace_ticks(), 30);
        assert_eq!(config.grace_seconds(), 3);
    }

    #[test]
    fn test_grace_seconds_remaining_rounds_up() {
        let config = RoomConfig::default();
        assert_eq!(config.grace_seconds_remaining(0), 3);
        assert_eq!(config.grace_seconds_remaining(1), 3);
        assert_eq!(config.grace_seconds_remaining(10), 2);
        assert_eq!(config.grace_seconds_remaining(11), 2);
        assert_eq!(config.grace_seconds_remaining(29), 1);
        assert_eq!(config.grace_seconds_remaining(30), 0);
        assert_eq!(config.grace_seconds_remaining(500), 0);
    }

    #[test]
    fn test_validated_clamps() {
        let config = RoomConfig {
            max_players: 9,
            food_spawn_chance: 4.0,
            tick_interval: Duration::ZERO,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.max_players, 3);
        assert_eq!(config.food_spawn_chance, 1.0);
        assert_eq!(config.tick_interval, Duration::from_millis(1));

        let config = RoomConfig {
            max_players: 0,
            food_spawn_chance: f64::NAN,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.max_players, 1);
        assert_eq!(config.food_spawn_chance, 0.0);
    }

    #[test]
    fn test_anchors_face_inwards() {
        for (head, direction) in ANCHORS {
            let tail = head.step(direction.opposite()).step(direction.opposite());
            assert!(tail.in_bounds());
            assert!(head.step(direction).in_bounds());
        }
    }

    #[test]
    fn test_room_phase_helpers() {
        assert!(RoomPhase::Running.is_running());
        assert!(!RoomPhase::Waiting.is_running());
        assert!(RoomPhase::GameOver.is_game_over());
        assert_eq!(RoomPhase::default(), RoomPhase::Waiting);
        assert_eq!(RoomPhase::GameOver.to_string(), "GameOver");
    }
}
