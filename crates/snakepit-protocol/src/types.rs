//! Core protocol types for Snakepit's wire format.
//!
//! Everything in this module travels "on the wire": the records that make
//! up a room snapshot, the commands clients send, and the events the
//! server pushes back. Field names are fixed (camelCase in JSON) so that
//! browser clients and the server can evolve independently.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Version stamped on every outbound [`Envelope`]. Bump it whenever a
/// record below changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Width and height of the square playing field, in cells.
pub const GRID_SIZE: i32 = 30;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// This is a newtype wrapper around the transport's connection number.
/// Two joins carrying the same `PlayerId` are, by definition, the same
/// player: that equality is the only identity check the server makes.
///
/// `#[serde(transparent)]` serializes a `PlayerId(42)` as plain `42`,
/// and `Ord` lets snapshots key their player maps by id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A room name chosen by the client (e.g. `"r1"`).
///
/// Unlike player ids, room ids are free-form strings: the first join to
/// an unseen id creates the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Longest room id accepted from a client.
    pub const MAX_LEN: usize = 64;

    /// Creates a room id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// Room logic returns `(Recipient, ServerEvent)` pairs and the room actor
/// fans them out to the matching connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// One specific player.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Grid geometry
// ---------------------------------------------------------------------------

/// One of the four grid directions a snake can travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// All directions, clockwise from `Up`.
    pub const ALL: [Direction; 4] =
        [Self::Up, Self::Right, Self::Down, Self::Left];

    /// Unit vector `(dx, dy)`. The y axis grows downwards.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    /// The direction pointing the other way.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Right => Self::Left,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
        }
    }

    /// `true` if turning from `current` to `self` would be a 180° turn.
    pub fn is_reverse_of(self, current: Direction) -> bool {
        self == current.opposite()
    }

    /// The next direction clockwise.
    pub const fn clockwise(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Right => "right",
            Self::Down => "down",
            Self::Left => "left",
        };
        f.write_str(name)
    }
}

/// A cell on the grid.
///
/// Positions are plain signed integers so that "one step past the wall"
/// can be represented and then rejected by [`Position::in_bounds`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell in `direction`. May lie outside the grid.
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// `true` if `0 <= x, y < GRID_SIZE`.
    pub const fn in_bounds(self) -> bool {
        self.x >= 0 && self.x < GRID_SIZE && self.y >= 0 && self.y < GRID_SIZE
    }
}

// ---------------------------------------------------------------------------
// Room records
// ---------------------------------------------------------------------------

/// A food item waiting to be eaten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    #[serde(flatten)]
    pub position: Position,
    /// CSS color string, e.g. `"hsl(120, 80%, 60%)"`.
    pub color: String,
}

/// A player's snake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snake {
    /// Body cells, head first.
    pub body: VecDeque<Position>,
    /// Direction applied on the last tick.
    pub direction: Direction,
    /// Direction queued by the player, adopted on the next tick.
    pub pending_direction: Direction,
    pub color: String,
    pub alive: bool,
    pub score: u32,
    /// Set once the player steers after a run starts. Until then the
    /// snake's own body is ignored for self-collision. Server-side only.
    #[serde(skip)]
    pub has_moved_since_start: bool,
}

impl Snake {
    /// The head cell.
    ///
    /// Snakes are created with three cells and never shrink, so the body
    /// is never empty; the fallback only exists to keep this infallible.
    pub fn head(&self) -> Position {
        self.body.front().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// `true` if any body cell sits on `position`.
    pub fn occupies(&self, position: Position) -> bool {
        self.body.contains(&position)
    }
}

/// A player inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Slot 0..=2. Picks the snake color and spawn anchor.
    pub color_index: usize,
    pub snake: Snake,
}

/// Player records keyed by identity, as they appear in snapshots.
pub type Roster = BTreeMap<PlayerId, Player>;

/// The serialized state of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Roster,
    pub food: Vec<Food>,
    pub running: bool,
    pub ticks_since_start: u64,
    pub grace_seconds_remaining: u32,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Commands a client can send.
///
/// JSON shape is adjacently tagged:
/// `{"type": "joinGame", "data": {"roomId": "r1", "name": "ada"}}`,
/// `{"type": "changeDirection", "data": "up"}`, `{"type": "startGame"}`.
/// Disconnection has no message; closing the socket is the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    JoinGame { room_id: RoomId, name: String },
    ChangeDirection(Direction),
    StartGame,
    ResetGame,
}

impl ClientCommand {
    /// Rejects commands that decode but are out of schema, and returns
    /// the rest normalized: room ids lose surrounding whitespace.
    pub fn validated(self) -> Result<Self, ProtocolError> {
        match self {
            Self::JoinGame { room_id, name } => {
                let id = room_id.as_str().trim();
                if id.is_empty() {
                    return Err(ProtocolError::InvalidMessage(
                        "room id must not be empty".into(),
                    ));
                }
                if id.len() > RoomId::MAX_LEN {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "room id longer than {} bytes",
                        RoomId::MAX_LEN
                    )));
                }
                Ok(Self::JoinGame {
                    room_id: RoomId::new(id),
                    name,
                })
            }
            other => Ok(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full snapshot, sent to a player on join and reconnect.
    GameState(Snapshot),
    /// Snapshot sent after every tick that changed something.
    GameUpdate(Snapshot),
    #[serde(rename_all = "camelCase")]
    PlayerJoined { players: Roster, running: bool },
    PlayerLeft(PlayerId),
    #[serde(rename_all = "camelCase")]
    GameStarted { grace_seconds: u32 },
    GameCountdown { seconds: u32 },
    #[serde(rename_all = "camelCase")]
    GameOver {
        winner: Option<PlayerId>,
        winner_name: Option<String>,
        players: Roster,
        ticks_since_start: u64,
    },
    GameReset(Snapshot),
    /// The room is at capacity; the join was rejected.
    GameFull,
}

/// Outbound frame: a versioned, sequenced wrapper around one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    /// Per-connection sequence number, starting at 1.
    pub seq: u64,
    pub event: ServerEvent,
}

impl Envelope {
    /// Wraps `event` with the current protocol version.
    pub fn new(seq: u64, event: ServerEvent) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            seq,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_reverse_pairs() {
        assert!(Direction::Up.is_reverse_of(Direction::Down));
        assert!(Direction::Left.is_reverse_of(Direction::Right));
        for d in Direction::ALL {
            assert!(!d.is_reverse_of(d));
            assert!(!d.clockwise().is_reverse_of(d));
            assert_eq!(d.opposite().opposite(), d);
        }
    }

    #[test]
    fn test_position_step_and_bounds() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.step(Direction::Right), Position::new(1, 0));
        assert_eq!(origin.step(Direction::Down), Position::new(0, 1));
        assert!(!origin.step(Direction::Up).in_bounds());
        assert!(!origin.step(Direction::Left).in_bounds());
        assert!(Position::new(GRID_SIZE - 1, GRID_SIZE - 1).in_bounds());
        assert!(!Position::new(GRID_SIZE, 0).in_bounds());
    }

    #[test]
    fn test_join_command_json_shape() {
        let cmd: ClientCommand = serde_json::from_value(json!({
            "type": "joinGame",
            "data": { "roomId": "r1", "name": "ada" }
        }))
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::JoinGame {
                room_id: RoomId::new("r1"),
                name: "ada".into(),
            }
        );
    }

    #[test]
    fn test_direction_and_unit_commands_parse() {
        let turn: ClientCommand = serde_json::from_value(
            json!({ "type": "changeDirection", "data": "left" }),
        )
        .unwrap();
        assert_eq!(turn, ClientCommand::ChangeDirection(Direction::Left));

        let start: ClientCommand =
            serde_json::from_value(json!({ "type": "startGame" })).unwrap();
        assert_eq!(start, ClientCommand::StartGame);
    }

    #[test]
    fn test_unknown_direction_is_rejected() {
        let result = serde_json::from_value::<ClientCommand>(
            json!({ "type": "changeDirection", "data": "north" }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_blank_room_id() {
        let cmd = ClientCommand::JoinGame {
            room_id: RoomId::new("   "),
            name: "ada".into(),
        };
        assert!(cmd.validated().is_err());
        assert_eq!(
            ClientCommand::StartGame.validated().unwrap(),
            ClientCommand::StartGame
        );
    }

    #[test]
    fn test_validated_trims_room_id() {
        let cmd = ClientCommand::JoinGame {
            room_id: RoomId::new("  r1 "),
            name: " ada ".into(),
        };
        assert_eq!(
            cmd.validated().unwrap(),
            ClientCommand::JoinGame {
                room_id: RoomId::new("r1"),
                name: " ada ".into(),
            }
        );
    }

    #[test]
    fn test_snapshot_uses_camel_case_and_hides_server_flags() {
        let mut players = Roster::new();
        players.insert(
            PlayerId(7),
            Player {
                id: PlayerId(7),
                name: "ada".into(),
                color_index: 1,
                snake: Snake {
                    body: VecDeque::from([
                        Position::new(3, 3),
                        Position::new(2, 3),
                    ]),
                    direction: Direction::Right,
                    pending_direction: Direction::Down,
                    color: "#FF5252".into(),
                    alive: true,
                    score: 10,
                    has_moved_since_start: true,
                },
            },
        );
        let snapshot = Snapshot {
            players,
            food: vec![Food {
                position: Position::new(1, 2),
                color: "hsl(10, 80%, 60%)".into(),
            }],
            running: true,
            ticks_since_start: 4,
            grace_seconds_remaining: 3,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        let snake = &value["players"]["7"]["snake"];
        assert_eq!(value["players"]["7"]["colorIndex"], 1);
        assert_eq!(snake["pendingDirection"], "down");
        assert_eq!(snake["body"][0], json!({ "x": 3, "y": 3 }));
        assert!(snake.get("hasMovedSinceStart").is_none());
        assert_eq!(value["food"][0], json!({ "x": 1, "y": 2, "color": "hsl(10, 80%, 60%)" }));
        assert_eq!(value["graceSecondsRemaining"], 3);
    }

    #[test]
    fn test_envelope_carries_version_and_tagged_event() {
        let env = Envelope::new(3, ServerEvent::GameStarted { grace_seconds: 3 });
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({
                "version": PROTOCOL_VERSION,
                "seq": 3,
                "event": { "type": "gameStarted", "data": { "graceSeconds": 3 } }
            })
        );

        let full = serde_json::to_value(Envelope::new(1, ServerEvent::GameFull)).unwrap();
        assert_eq!(full["event"], json!({ "type": "gameFull" }));
    }
}
