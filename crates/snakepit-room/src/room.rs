//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands and ticks are handled one at a time,
//! so a command never lands in the middle of a tick.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use snakepit_protocol::{Direction, PlayerId, Recipient, RoomId, ServerEvent, Snapshot};
use snakepit_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};

use crate::state::{JoinKind, Outcome, Room, Scheduled};
use crate::{RoomError, RoomPhase};

/// Channel sender for delivering events to one player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Default command channel size for room actors.
pub(crate) const DEFAULT_CHANNEL_SIZE: usize = 64;

/// In-game commands a player can send once in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    ChangeDirection(Direction),
    StartGame,
    ResetGame,
}

/// Result of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Whether the player was in the room.
    pub removed: bool,
    /// Whether the room is now empty (and its actor stopping).
    pub room_empty: bool,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is a reply channel: the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<JoinKind, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<LeaveOutcome>,
    },
    Player {
        player_id: PlayerId,
        command: PlayerCommand,
    },
    /// Delayed food replacement, sent by the actor to itself.
    Replenish { generation: u64 },
    /// End of a pre-start countdown, sent by the actor to itself.
    CountdownElapsed { generation: u64 },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Room metadata, for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub player_count: usize,
    pub max_players: usize,
    pub food_count: usize,
    pub ticks_since_start: u64,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's ID.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Whether both handles point at the same actor.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    /// Sends a join request and waits for the room's answer.
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<JoinKind, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                player_id,
                name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a player and waits until the room has processed it.
    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Delivers an in-game command (fire-and-forget).
    pub async fn send(&self, player_id: PlayerId, command: PlayerCommand) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Player { player_id, command })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Requests the current snapshot.
    pub async fn snapshot(&self) -> Result<Snapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
/// Advances a room by one tick.
type TickFn = fn(&mut Room) -> Outcome;

struct RoomActor {
    room: Room,
    /// [`Room::tick`] outside of tests.
    tick: TickFn,
    timer: TickScheduler,
    /// Per-player outbound channels.
    senders: HashMap<PlayerId, PlayerSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Used to post delayed work back to this actor.
    self_tx: mpsc::Sender<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until the room empties.
    async fn run(mut self) {
        let room_id = self.room.id().clone();
        tracing::info!(%room_id, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).is_break() {
                        break;
                    }
                }
                _ = self.timer.wait_for_tick() => self.on_tick(),
            }
            self.sync_timer();
        }

        self.timer.stop();
        tracing::info!(%room_id, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                sender,
                reply,
            } => {
                let result = self.room.join(player_id, &name).map(|(kind, outcome)| {
                    self.senders.insert(player_id, sender);
                    self.dispatch(outcome);
                    kind
                });
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let removed = match self.room.leave(player_id) {
                    Some(outcome) => {
                        self.senders.remove(&player_id);
                        self.dispatch(outcome);
                        true
                    }
                    None => false,
                };
                let room_empty = self.room.is_empty();
                let _ = reply.send(LeaveOutcome {
                    removed,
                    room_empty,
                });
                if room_empty {
                    tracing::info!(room_id = %self.room.id(), "last player left");
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::Player { player_id, command } => self.handle_player(player_id, command),
            RoomCommand::Replenish { generation } => {
                let outcome = self.room.replenish_food(generation);
                self.dispatch(outcome);
            }
            RoomCommand::CountdownElapsed { generation } => {
                let outcome = self.room.finish_countdown(generation);
                self.dispatch(outcome);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_player(&mut self, player_id: PlayerId, command: PlayerCommand) {
        if self.room.player(player_id).is_none() {
            tracing::debug!(
                room_id = %self.room.id(),
                %player_id,
                "command from non-member, ignoring"
            );
            return;
        }
        let result = match command {
            PlayerCommand::ChangeDirection(direction) => self
                .room
                .change_direction(player_id, direction)
                .map(|()| Outcome::default()),
            PlayerCommand::StartGame => self.room.start_game(),
            PlayerCommand::ResetGame => {
                tracing::info!(room_id = %self.room.id(), %player_id, "reset requested");
                Ok(self.room.reset())
            }
        };
        match result {
            Ok(outcome) => self.dispatch(outcome),
            Err(reason) => tracing::debug!(
                room_id = %self.room.id(),
                %player_id,
                ?command,
                %reason,
                "command ignored"
            ),
        }
    }

    /// Runs one simulation step. A panic stops this room's run only.
    fn on_tick(&mut self) {
        let tick = self.tick;
        let result = panic::catch_unwind(AssertUnwindSafe(|| tick(&mut self.room)));
        self.timer.record_tick_end();
        match result {
            Ok(outcome) => self.dispatch(outcome),
            Err(_) => {
                tracing::error!(
                    room_id = %self.room.id(),
                    tick = self.room.ticks_since_start(),
                    "tick panicked, aborting run"
                );
                let outcome = self.room.abort_run();
                self.dispatch(outcome);
            }
        }
    }

    /// The timer runs exactly while the room is running.
    fn sync_timer(&mut self) {
        if self.room.phase().is_running() {
            self.timer.start();
        } else {
            self.timer.stop();
        }
    }

    /// Delivers events and schedules delayed work.
    fn dispatch(&self, outcome: Outcome) {
        for (recipient, event) in outcome.events {
            match recipient {
                Recipient::All => {
                    for player_id in self.senders.keys() {
                        self.send_to(*player_id, event.clone());
                    }
                }
                Recipient::Player(player_id) => self.send_to(player_id, event),
            }
        }
        for job in outcome.scheduled {
            self.schedule(job);
        }
    }

    /// Sends an event to a single player. Silently drops it if the
    /// receiver is gone (player disconnected).
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(event);
        }
    }

    fn schedule(&self, job: Scheduled) {
        let (after, command) = match job {
            Scheduled::ReplenishFood { generation, after } => {
                (after, RoomCommand::Replenish { generation })
            }
            Scheduled::FinishCountdown { generation, after } => {
                (after, RoomCommand::CountdownElapsed { generation })
            }
        };
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The room may be gone by now.
            let _ = tx.send(command).await;
        });
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room.id().clone(),
            phase: self.room.phase(),
            player_count: self.room.players().len(),
            max_players: self.room.config().max_players,
            food_count: self.room.food().len(),
            ticks_since_start: self.room.ticks_since_start(),
        }
    }
}

/// Spawns a room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room(room: Room, channel_size: usize) -> RoomHandle {
    spawn_actor(room, channel_size, Room::tick)
}

fn spawn_actor(room: Room, channel_size: usize, tick: TickFn) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let room_id = room.id().clone();
    let timer = TickScheduler::new(TickConfig::with_interval(room.config().tick_interval));

    let actor = RoomActor {
        room,
        tick,
        timer,
        senders: HashMap::new(),
        receiver: rx,
        self_tx: tx.clone(),
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
