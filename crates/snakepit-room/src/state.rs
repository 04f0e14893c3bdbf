//! Room state and the lifecycle transitions that act on it.
//!
//! [`Room`] is plain data plus synchronous methods. It knows nothing about
//! channels or timers: every method returns an [`Outcome`] listing the
//! events to send and the delayed work to schedule, and the room actor
//! carries those out.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snakepit_protocol::{
    Direction, Food, GRID_SIZE, Player, PlayerId, Position, Recipient, RoomId, ServerEvent, Snake,
};

use crate::config::{ANCHORS, MAX_NAME_CHARS, PLAYER_COLORS};
use crate::{RoomConfig, RoomError, RoomPhase};

/// Work the room wants done later, delivered back into the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// Place one food item, if the run `generation` is still current.
    ReplenishFood { generation: u64, after: Duration },
    /// Begin the run once the countdown for `generation` has elapsed.
    FinishCountdown { generation: u64, after: Duration },
}

/// What a room transition produced.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Events to deliver, in order.
    pub events: Vec<(Recipient, ServerEvent)>,
    /// Delayed work to schedule.
    pub scheduled: Vec<Scheduled>,
}

impl Outcome {
    pub(crate) fn broadcast(&mut self, event: ServerEvent) {
        self.events.push((Recipient::All, event));
    }

    pub(crate) fn send_to(&mut self, player_id: PlayerId, event: ServerEvent) {
        self.events.push((Recipient::Player(player_id), event));
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.scheduled.is_empty()
    }
}

/// How a successful join was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// A new player was added.
    Joined,
    /// The identity was already in the room; its player was kept.
    Reconnected,
}

/// One game room: its players, food, and lifecycle.
#[derive(Debug)]
pub struct Room {
    pub(crate) id: RoomId,
    pub(crate) config: RoomConfig,
    /// Insertion order; earlier players move first.
    pub(crate) players: Vec<Player>,
    pub(crate) food: Vec<Food>,
    pub(crate) phase: RoomPhase,
    pub(crate) ticks_since_start: u64,
    pub(crate) dirty: bool,
    /// Joins received while in `GameOver`.
    pub(crate) rejoin_count: usize,
    /// Bumped whenever a run starts, ends, aborts, or is reset.
    pub(crate) generation: u64,
    pub(crate) countdown_pending: bool,
    pub(crate) rng: StdRng,
}

impl Room {
    /// Creates an empty room seeded from the OS.
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self::with_rng(id, config, StdRng::from_os_rng())
    }

    /// Creates an empty room with a fixed seed, for reproducible food.
    pub fn with_seed(id: RoomId, config: RoomConfig, seed: u64) -> Self {
        Self::with_rng(id, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: RoomId, config: RoomConfig, rng: StdRng) -> Self {
        Self {
            id,
            config: config.validated(),
            players: Vec::new(),
            food: Vec::new(),
            phase: RoomPhase::Waiting,
            ticks_since_start: 0,
            dirty: true,
            rejoin_count: 0,
            generation: 0,
            countdown_pending: false,
            rng,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn food(&self) -> &[Food] {
        &self.food
    }

    pub fn ticks_since_start(&self) -> u64 {
        self.ticks_since_start
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Adds `player_id` to the room, or treats the join as a reconnection
    /// if that identity is already here.
    ///
    /// In GameOver the capacity check is skipped and each new identity
    /// counts toward the automatic reset.
    ///
    /// # Errors
    /// [`RoomError::RoomFull`] when every slot is taken by other players
    /// and the room is not in GameOver.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        name: &str,
    ) -> Result<(JoinKind, Outcome), RoomError> {
        let name = sanitize_name(name);
        let mut outcome = Outcome::default();

        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            if player.name != name {
                player.name = name;
                self.dirty = true;
            }
            tracing::info!(room_id = %self.id, %player_id, "player reconnected");
            self.send_welcome(player_id, &mut outcome);
            return Ok((JoinKind::Reconnected, outcome));
        }

        // A finished room admits everyone so its players can regroup.
        let game_over = self.phase.is_game_over();
        if self.players.len() >= self.config.max_players && !game_over {
            return Err(RoomError::RoomFull(self.id.clone()));
        }

        if game_over {
            self.rejoin_count += 1;
            if self.rejoin_count >= self.players.len() {
                tracing::info!(room_id = %self.id, "all players rejoined, resetting");
                self.reset_into(&mut outcome);
            }
        }

        let color_index = self.free_color_index();
        self.players.push(Player {
            id: player_id,
            name,
            color_index,
            snake: spawn_snake(color_index),
        });
        self.dirty = true;

        if self.players.len() == 1 && self.food.is_empty() {
            self.fill_food();
        }

        tracing::info!(
            room_id = %self.id,
            %player_id,
            color_index,
            players = self.players.len(),
            "player joined"
        );

        outcome.broadcast(ServerEvent::PlayerJoined {
            players: self.roster(),
            running: self.phase.is_running(),
        });
        self.send_welcome(player_id, &mut outcome);
        Ok((JoinKind::Joined, outcome))
    }

    /// Removes `player_id`. Returns `None` if it was not here.
    ///
    /// Removing the last player yields an empty outcome; the caller is
    /// expected to discard the room.
    pub fn leave(&mut self, player_id: PlayerId) -> Option<Outcome> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        self.players.remove(index);
        self.dirty = true;

        tracing::info!(
            room_id = %self.id,
            %player_id,
            players = self.players.len(),
            "player left"
        );

        let mut outcome = Outcome::default();
        if !self.players.is_empty() {
            outcome.broadcast(ServerEvent::PlayerLeft(player_id));
        }
        Some(outcome)
    }

    /// Queues a turn for `player_id`'s snake, applied on the next tick.
    ///
    /// # Errors
    /// - [`RoomError::NotInRoom`] for unknown players.
    /// - [`RoomError::InvalidState`] when not running, when the snake is
    ///   dead, or when `direction` reverses the current heading.
    pub fn change_direction(
        &mut self,
        player_id: PlayerId,
        direction: Direction,
    ) -> Result<(), RoomError> {
        let running = self.phase.is_running();
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;

        if !running {
            return Err(RoomError::InvalidState("game is not running".into()));
        }
        let snake = &mut player.snake;
        if !snake.alive {
            return Err(RoomError::InvalidState("snake is dead".into()));
        }
        if direction.is_reverse_of(snake.direction) {
            return Err(RoomError::InvalidState(format!(
                "cannot reverse from {} to {direction}",
                snake.direction
            )));
        }
        if snake.pending_direction != direction {
            snake.pending_direction = direction;
            snake.has_moved_since_start = true;
            self.dirty = true;
        }
        Ok(())
    }

    /// Starts a run, or the countdown to one when `countdown_secs > 0`.
    ///
    /// # Errors
    /// [`RoomError::InvalidState`] unless the room is `Waiting` with at
    /// least one player and no countdown in progress. After a game over
    /// the room must be reset first.
    pub fn start_game(&mut self) -> Result<Outcome, RoomError> {
        match self.phase {
            RoomPhase::Running => {
                return Err(RoomError::InvalidState("game already running".into()));
            }
            RoomPhase::GameOver => {
                return Err(RoomError::InvalidState("game over, reset first".into()));
            }
            RoomPhase::Waiting => {}
        }
        if self.players.is_empty() {
            return Err(RoomError::InvalidState("no players in room".into()));
        }
        if self.countdown_pending {
            return Err(RoomError::InvalidState("countdown in progress".into()));
        }

        let mut outcome = Outcome::default();
        let seconds = self.config.countdown_secs;
        if seconds > 0 {
            self.countdown_pending = true;
            tracing::info!(room_id = %self.id, seconds, "countdown started");
            outcome.broadcast(ServerEvent::GameCountdown { seconds });
            outcome.scheduled.push(Scheduled::FinishCountdown {
                generation: self.generation,
                after: Duration::from_secs(u64::from(seconds)),
            });
        } else {
            self.begin_run(&mut outcome);
        }
        Ok(outcome)
    }

    /// Completes a countdown started by [`start_game`](Self::start_game).
    /// Stale generations are ignored.
    pub fn finish_countdown(&mut self, generation: u64) -> Outcome {
        let mut outcome = Outcome::default();
        if generation != self.generation || !self.countdown_pending {
            tracing::debug!(room_id = %self.id, generation, "stale countdown dropped");
            return outcome;
        }
        self.countdown_pending = false;
        if self.phase == RoomPhase::Waiting && !self.players.is_empty() {
            self.begin_run(&mut outcome);
        }
        outcome
    }

    /// Returns the room to `Waiting`: every snake back on its anchor,
    /// scores and counters cleared, food refilled. Allowed from any phase.
    pub fn reset(&mut self) -> Outcome {
        let mut outcome = Outcome::default();
        self.reset_into(&mut outcome);
        outcome
    }

    /// Places one food item eaten during run `generation`.
    pub fn replenish_food(&mut self, generation: u64) -> Outcome {
        if generation != self.generation || !self.phase.is_running() {
            tracing::debug!(room_id = %self.id, generation, "stale replenishment dropped");
        } else if self.spawn_food() {
            self.dirty = true;
        }
        Outcome::default()
    }

    /// Abandons the current run after a fault. The room returns to
    /// `Waiting` with its players and food as they were.
    pub fn abort_run(&mut self) -> Outcome {
        self.phase = RoomPhase::Waiting;
        self.countdown_pending = false;
        self.generation += 1;
        self.dirty = true;

        let mut outcome = Outcome::default();
        if let Some(update) = self.flush_update() {
            outcome.broadcast(update);
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn begin_run(&mut self, outcome: &mut Outcome) {
        for player in &mut self.players {
            let score = player.snake.score;
            player.snake = spawn_snake(player.color_index);
            player.snake.score = score;
        }
        self.phase = RoomPhase::Running;
        self.ticks_since_start = 0;
        self.rejoin_count = 0;
        self.generation += 1;
        self.dirty = true;

        tracing::info!(
            room_id = %self.id,
            players = self.players.len(),
            generation = self.generation,
            "game started"
        );
        outcome.broadcast(ServerEvent::GameStarted {
            grace_seconds: self.config.grace_seconds(),
        });
    }

    pub(crate) fn end_game(&mut self, outcome: &mut Outcome) {
        self.phase = RoomPhase::GameOver;
        self.rejoin_count = 0;
        self.generation += 1;

        let mut alive = self.players.iter().filter(|p| p.snake.alive);
        let winner = match (alive.next(), alive.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        };

        tracing::info!(
            room_id = %self.id,
            winner = ?winner.map(|p| p.id),
            ticks = self.ticks_since_start,
            "game over"
        );
        outcome.broadcast(ServerEvent::GameOver {
            winner: winner.map(|p| p.id),
            winner_name: winner.map(|p| p.name.clone()),
            players: self.roster(),
            ticks_since_start: self.ticks_since_start,
        });
    }

    fn reset_into(&mut self, outcome: &mut Outcome) {
        for player in &mut self.players {
            player.snake = spawn_snake(player.color_index);
        }
        self.food.clear();
        self.phase = RoomPhase::Waiting;
        self.ticks_since_start = 0;
        self.rejoin_count = 0;
        self.countdown_pending = false;
        self.generation += 1;
        self.fill_food();
        self.dirty = false;

        tracing::info!(room_id = %self.id, generation = self.generation, "game reset");
        outcome.broadcast(ServerEvent::GameReset(self.snapshot()));
    }

    /// Sends the full snapshot, plus `gameStarted` if a run is underway.
    fn send_welcome(&self, player_id: PlayerId, outcome: &mut Outcome) {
        outcome.send_to(player_id, ServerEvent::GameState(self.snapshot()));
        if self.phase.is_running() {
            outcome.send_to(
                player_id,
                ServerEvent::GameStarted {
                    grace_seconds: self.grace_seconds_remaining(),
                },
            );
        }
    }

    /// Lowest unused color. Once every color is taken (only possible in
    /// GameOver) the least shared one, lowest first.
    fn free_color_index(&self) -> usize {
        (0..PLAYER_COLORS.len())
            .min_by_key(|i| self.players.iter().filter(|p| p.color_index == *i).count())
            .unwrap_or(0)
    }

    fn is_empty_cell(&self, position: Position) -> bool {
        !self.food.iter().any(|f| f.position == position)
            && !self.players.iter().any(|p| p.snake.occupies(position))
    }

    /// Tries to place one food item on a random empty cell.
    /// Returns `false` at capacity or when every attempt hit something.
    pub(crate) fn spawn_food(&mut self) -> bool {
        if self.food.len() >= self.config.max_food {
            return false;
        }
        for _ in 0..self.config.food_placement_attempts {
            let position = Position::new(
                self.rng.random_range(0..GRID_SIZE),
                self.rng.random_range(0..GRID_SIZE),
            );
            if self.is_empty_cell(position) {
                let hue: u32 = self.rng.random_range(0..360);
                self.food.push(Food {
                    position,
                    color: format!("hsl({hue}, 80%, 60%)"),
                });
                return true;
            }
        }
        false
    }

    fn fill_food(&mut self) {
        while self.food.len() < self.config.max_food && self.spawn_food() {}
    }
}

/// A fresh 3-cell snake on the anchor for `color_index`.
pub(crate) fn spawn_snake(color_index: usize) -> Snake {
    let slot = color_index % ANCHORS.len();
    let (head, direction) = ANCHORS[slot];
    let behind = direction.opposite();
    let body: VecDeque<Position> = [head, head.step(behind), head.step(behind).step(behind)]
        .into_iter()
        .collect();
    Snake {
        body,
        direction,
        pending_direction: direction,
        color: PLAYER_COLORS[slot].to_string(),
        alive: true,
        score: 0,
        has_moved_since_start: false,
    }
}

/// Trims, caps at [`MAX_NAME_CHARS`], and falls back to `"Player"`.
fn sanitize_name(name: &str) -> String {
    let trimmed: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        "Player".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::with_seed(RoomId::new("r1"), RoomConfig::default(), 7)
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn events_for(outcome: &Outcome, player: PlayerId) -> Vec<&ServerEvent> {
        outcome
            .events
            .iter()
            .filter(|(to, _)| match to {
                Recipient::All => true,
                Recipient::Player(p) => *p == player,
            })
            .map(|(_, e)| e)
            .collect()
    }

    #[test]
    fn test_spawn_snake_trails_behind_anchor() {
        let snake = spawn_snake(0);
        let cells: Vec<_> = snake.body.iter().copied().collect();
        assert_eq!(
            cells,
            vec![Position::new(6, 6), Position::new(5, 6), Position::new(4, 6)]
        );
        assert_eq!(snake.direction, Direction::Right);
        assert_eq!(snake.color, "#6EE766");

        let snake = spawn_snake(2);
        assert_eq!(snake.head(), Position::new(15, 24));
        assert_eq!(snake.body[2], Position::new(15, 26));
        assert_eq!(snake.direction, Direction::Up);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  ada  "), "ada");
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnop");
    }

    #[test]
    fn test_first_join_fills_food_and_welcomes() {
        let mut room = room();
        let (kind, outcome) = room.join(pid(1), "ada").unwrap();

        assert_eq!(kind, JoinKind::Joined);
        assert_eq!(room.food().len(), 3);
        assert_eq!(room.players()[0].color_index, 0);

        let events = events_for(&outcome, pid(1));
        assert!(matches!(events[0], ServerEvent::PlayerJoined { running: false, .. }));
        assert!(matches!(events[1], ServerEvent::GameState(s) if s.food.len() == 3));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_food_never_overlaps_snakes_or_itself() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();

        for (i, food) in room.food().iter().enumerate() {
            assert!(food.position.in_bounds());
            assert!(!room.players().iter().any(|p| p.snake.occupies(food.position)));
            assert!(!room.food()[i + 1..].iter().any(|f| f.position == food.position));
            assert!(food.color.starts_with("hsl("));
            assert!(food.color.ends_with(", 80%, 60%)"));
        }
    }

    #[test]
    fn test_color_indices_are_lowest_free() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();
        room.join(pid(3), "c").unwrap();
        room.leave(pid(2));

        room.join(pid(4), "d").unwrap();
        let player = room.player(pid(4)).unwrap();
        assert_eq!(player.color_index, 1);
        assert_eq!(player.snake.head(), Position::new(24, 6));
        assert_eq!(player.snake.color, "#FF5252");
    }

    #[test]
    fn test_fourth_player_is_rejected_but_reconnect_is_not() {
        let mut room = room();
        for id in 1..=3 {
            room.join(pid(id), "p").unwrap();
        }

        let err = room.join(pid(4), "intruder").unwrap_err();
        assert_eq!(err, RoomError::RoomFull(RoomId::new("r1")));

        let (kind, outcome) = room.join(pid(2), "again").unwrap();
        assert_eq!(kind, JoinKind::Reconnected);
        assert_eq!(room.players().len(), 3);
        assert_eq!(room.player(pid(2)).unwrap().name, "again");
        assert!(matches!(
            outcome.events.as_slice(),
            [(Recipient::Player(p), ServerEvent::GameState(_))] if *p == pid(2)
        ));
    }

    #[test]
    fn test_reconnect_while_running_preserves_player_and_sends_started() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();
        room.start_game().unwrap();
        room.player_mut_for_test(pid(2)).snake.score = 40;

        let (kind, outcome) = room.join(pid(2), "b").unwrap();

        assert_eq!(kind, JoinKind::Reconnected);
        let player = room.player(pid(2)).unwrap();
        assert_eq!(player.color_index, 1);
        assert_eq!(player.snake.score, 40);
        assert_eq!(room.players().len(), 2);
        let events = events_for(&outcome, pid(2));
        assert!(matches!(events[0], ServerEvent::GameState(s) if s.running));
        assert!(matches!(events[1], ServerEvent::GameStarted { grace_seconds: 3 }));
    }

    #[test]
    fn test_leave_is_idempotent_and_notifies_others() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();

        let outcome = room.leave(pid(1)).unwrap();
        assert!(matches!(
            outcome.events.as_slice(),
            [(Recipient::All, ServerEvent::PlayerLeft(p))] if *p == pid(1)
        ));
        assert!(room.leave(pid(1)).is_none());

        let last = room.leave(pid(2)).unwrap();
        assert!(last.is_empty());
        assert!(room.is_empty());
    }

    #[test]
    fn test_change_direction_rules() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();

        assert!(matches!(
            room.change_direction(pid(1), Direction::Up),
            Err(RoomError::InvalidState(_))
        ));
        assert_eq!(
            room.change_direction(pid(9), Direction::Up),
            Err(RoomError::NotInRoom(pid(9)))
        );

        room.start_game().unwrap();
        room.dirty = false;

        // Reverse of the current heading (right) has no effect.
        assert!(room.change_direction(pid(1), Direction::Left).is_err());
        let snake = &room.player(pid(1)).unwrap().snake;
        assert_eq!(snake.pending_direction, Direction::Right);
        assert!(!snake.has_moved_since_start);
        assert!(!room.is_dirty());

        room.change_direction(pid(1), Direction::Down).unwrap();
        let snake = &room.player(pid(1)).unwrap().snake;
        assert_eq!(snake.pending_direction, Direction::Down);
        assert_eq!(snake.direction, Direction::Right);
        assert!(snake.has_moved_since_start);
        assert!(room.is_dirty());
    }

    #[test]
    fn test_every_direction_reversal_is_rejected() {
        for current in Direction::ALL {
            let mut room = room();
            room.join(pid(1), "a").unwrap();
            room.start_game().unwrap();
            {
                let snake = &mut room.player_mut_for_test(pid(1)).snake;
                snake.direction = current;
                snake.pending_direction = current;
            }
            for requested in Direction::ALL {
                let result = room.change_direction(pid(1), requested);
                if requested.is_reverse_of(current) {
                    assert!(result.is_err(), "{requested} reverses {current}");
                    assert_eq!(room.player(pid(1)).unwrap().snake.pending_direction, current);
                } else {
                    assert!(result.is_ok());
                    room.player_mut_for_test(pid(1)).snake.pending_direction = current;
                }
            }
        }
    }

    #[test]
    fn test_start_game_transitions() {
        let mut room = room();
        assert!(room.start_game().is_err(), "empty room cannot start");

        room.join(pid(1), "a").unwrap();
        let before = room.generation();
        let outcome = room.start_game().unwrap();

        assert_eq!(room.phase(), RoomPhase::Running);
        assert_eq!(room.ticks_since_start(), 0);
        assert_eq!(room.generation(), before + 1);
        assert!(matches!(
            outcome.events.as_slice(),
            [(Recipient::All, ServerEvent::GameStarted { grace_seconds: 3 })]
        ));
        assert!(room.start_game().is_err(), "already running");
    }

    #[test]
    fn test_start_after_game_over_requires_reset() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.start_game().unwrap();
        let mut outcome = Outcome::default();
        room.end_game(&mut outcome);

        assert!(matches!(room.start_game(), Err(RoomError::InvalidState(_))));
        room.reset();
        assert!(room.start_game().is_ok());
    }

    #[test]
    fn test_countdown_defers_start() {
        let config = RoomConfig {
            countdown_secs: 3,
            ..RoomConfig::default()
        };
        let mut room = Room::with_seed(RoomId::new("r1"), config, 1);
        room.join(pid(1), "a").unwrap();

        let outcome = room.start_game().unwrap();
        assert_eq!(room.phase(), RoomPhase::Waiting);
        assert!(matches!(
            outcome.events.as_slice(),
            [(Recipient::All, ServerEvent::GameCountdown { seconds: 3 })]
        ));
        let [Scheduled::FinishCountdown { generation, after }] = outcome.scheduled[..] else {
            panic!("expected a countdown to be scheduled");
        };
        assert_eq!(after, Duration::from_secs(3));
        assert!(room.start_game().is_err(), "countdown already pending");

        let outcome = room.finish_countdown(generation);
        assert_eq!(room.phase(), RoomPhase::Running);
        assert!(matches!(
            outcome.events.as_slice(),
            [(Recipient::All, ServerEvent::GameStarted { .. })]
        ));
    }

    #[test]
    fn test_reset_cancels_countdown() {
        let config = RoomConfig {
            countdown_secs: 2,
            ..RoomConfig::default()
        };
        let mut room = Room::with_seed(RoomId::new("r1"), config, 1);
        room.join(pid(1), "a").unwrap();
        let generation = room.generation();
        room.start_game().unwrap();
        room.reset();

        let outcome = room.finish_countdown(generation);
        assert!(outcome.is_empty());
        assert_eq!(room.phase(), RoomPhase::Waiting);
    }

    #[test]
    fn test_reset_twice_yields_identical_players() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();
        room.start_game().unwrap();
        room.player_mut_for_test(pid(1)).snake.score = 50;
        room.player_mut_for_test(pid(2)).snake.alive = false;

        let first = room.reset();
        let ServerEvent::GameReset(first) = &first.events[0].1 else {
            panic!("expected gameReset");
        };
        let second = room.reset();
        let ServerEvent::GameReset(second) = &second.events[0].1 else {
            panic!("expected gameReset");
        };

        assert_eq!(first.players, second.players);
        assert_eq!(first.food.len(), 3);
        assert_eq!(second.food.len(), 3);
        assert!(!first.running);
        assert_eq!(first.ticks_since_start, 0);
        for player in first.players.values() {
            let anchor = spawn_snake(player.color_index);
            assert_eq!(player.snake, anchor);
        }
        assert!(!room.is_dirty());
    }

    #[test]
    fn test_game_over_rejoin_counter_triggers_reset() {
        let config = RoomConfig {
            max_players: 3,
            ..RoomConfig::default()
        };
        let mut room = Room::with_seed(RoomId::new("r1"), config, 3);
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();
        room.start_game().unwrap();
        let mut outcome = Outcome::default();
        room.end_game(&mut outcome);
        room.leave(pid(2));

        // One player left; a single rejoin reaches the count and resets.
        let (_, outcome) = room.join(pid(3), "c").unwrap();

        assert_eq!(room.phase(), RoomPhase::Waiting);
        assert!(
            outcome
                .events
                .iter()
                .any(|(_, e)| matches!(e, ServerEvent::GameReset(_)))
        );
        assert_eq!(room.players().len(), 2);
    }

    #[test]
    fn test_game_over_join_below_count_keeps_game_over() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();
        room.start_game().unwrap();
        let mut outcome = Outcome::default();
        room.end_game(&mut outcome);

        room.join(pid(3), "c").unwrap();

        assert_eq!(room.phase(), RoomPhase::GameOver);
        assert_eq!(room.rejoin_count, 1);
        assert_eq!(room.players().len(), 3);
    }

    #[test]
    fn test_full_room_in_game_over_admits_new_identity() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.join(pid(2), "b").unwrap();
        room.join(pid(3), "c").unwrap();
        room.start_game().unwrap();
        let mut outcome = Outcome::default();
        room.end_game(&mut outcome);

        let (kind, outcome) = room.join(pid(4), "d").unwrap();

        assert_eq!(kind, JoinKind::Joined);
        assert_eq!(room.phase(), RoomPhase::GameOver);
        assert_eq!(room.rejoin_count, 1);
        assert_eq!(room.players().len(), 4);
        let newcomer = room.player(pid(4)).unwrap();
        assert_eq!(newcomer.color_index, 0, "colors wrap once all are taken");
        assert_eq!(newcomer.snake, spawn_snake(0));
        let welcome = events_for(&outcome, pid(4));
        assert!(
            welcome
                .iter()
                .any(|e| matches!(e, ServerEvent::GameState(s) if s.players.len() == 4))
        );

        room.join(pid(5), "e").unwrap();
        assert_eq!(room.player(pid(5)).unwrap().color_index, 1);
    }

    #[test]
    fn test_full_room_outside_game_over_stays_full() {
        let mut room = room();
        for id in 1..=3 {
            room.join(pid(id), "p").unwrap();
        }
        room.start_game().unwrap();

        let result = room.join(pid(4), "d");

        assert_eq!(result.unwrap_err(), RoomError::RoomFull(RoomId::new("r1")));
        assert_eq!(room.rejoin_count, 0);
    }

    #[test]
    fn test_stale_replenishment_is_dropped() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.start_game().unwrap();
        let old = room.generation();
        room.food.clear();

        room.reset();
        room.food.clear();
        room.start_game().unwrap();
        room.replenish_food(old);
        assert!(room.food().is_empty());

        room.replenish_food(room.generation());
        assert_eq!(room.food().len(), 1);
    }

    #[test]
    fn test_abort_run_returns_to_waiting() {
        let mut room = room();
        room.join(pid(1), "a").unwrap();
        room.start_game().unwrap();
        let generation = room.generation();

        let outcome = room.abort_run();

        assert_eq!(room.phase(), RoomPhase::Waiting);
        assert!(room.generation() > generation);
        assert!(matches!(
            outcome.events.as_slice(),
            [(Recipient::All, ServerEvent::GameUpdate(s))] if !s.running
        ));
    }

    impl Room {
        pub(crate) fn player_mut_for_test(&mut self, player_id: PlayerId) -> &mut Player {
            self.players
                .iter_mut()
                .find(|p| p.id == player_id)
                .expect("player in room")
        }
    }
}
