//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;

use snakepit_protocol::{PlayerId, RoomId, Snapshot};
use snakepit_session::SessionRegistry;
use tokio::sync::Mutex;

use crate::room::{DEFAULT_CHANNEL_SIZE, spawn_room};
use crate::{
    JoinKind, PlayerCommand, PlayerSender, Room, RoomConfig, RoomError, RoomHandle, RoomInfo,
};

/// Owns every live room and the player -> room index.
///
/// One `RoomManager` exists per server process. Rooms are created on the
/// first join to an unseen id and forgotten when their last player leaves.
/// No lock is held while waiting on a room actor.
pub struct RoomManager {
    config: RoomConfig,
    /// Active rooms, keyed by room ID.
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    /// Which room each player is in. A player is in at most ONE room.
    sessions: Mutex<SessionRegistry>,
}

impl RoomManager {
    /// Creates a manager whose rooms use `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            rooms: Mutex::new(HashMap::new()),
            sessions: Mutex::new(SessionRegistry::new()),
        }
    }

    /// The configuration new rooms are created with.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Joins `player_id` to `room_id`, creating the room if needed.
    ///
    /// A player already in another room leaves it first. Joining the room
    /// the player is already in is a reconnection.
    ///
    /// # Errors
    /// [`RoomError::RoomFull`] when the room has no free slot.
    pub async fn join(
        &self,
        player_id: PlayerId,
        room_id: RoomId,
        name: String,
        sender: PlayerSender,
    ) -> Result<JoinKind, RoomError> {
        let previous = self.sessions.lock().await.lookup(&player_id);
        if let Some(previous) = previous.filter(|prev| *prev != room_id) {
            tracing::debug!(%player_id, from = %previous, to = %room_id, "switching rooms");
            self.sessions.lock().await.unregister(&player_id);
            self.leave_room(player_id, &previous).await;
        }

        let mut retried = false;
        loop {
            let handle = self.get_or_create(&room_id).await;
            match handle.join(player_id, name.clone(), sender.clone()).await {
                Ok(kind) => {
                    self.sessions.lock().await.register(player_id, room_id);
                    return Ok(kind);
                }
                // The room emptied and stopped between lookup and join.
                Err(RoomError::Unavailable(_)) if !retried => {
                    retried = true;
                    self.forget(&room_id, &handle).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Removes `player_id` from whatever room it is in. Idempotent.
    ///
    /// Returns once the room has processed the removal, so a command sent
    /// afterwards never sees the stale player.
    pub async fn disconnect(&self, player_id: PlayerId) {
        let room_id = self.sessions.lock().await.unregister(&player_id);
        if let Some(room_id) = room_id {
            self.leave_room(player_id, &room_id).await;
        }
    }

    /// Routes an in-game command to the player's room.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the player has not joined a room.
    pub async fn route(
        &self,
        player_id: PlayerId,
        command: PlayerCommand,
    ) -> Result<(), RoomError> {
        let room_id = self
            .sessions
            .lock()
            .await
            .lookup(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;
        let handle = self.handle(&room_id).await?;
        handle.send(player_id, command).await
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        self.handle(room_id).await?.info().await
    }

    /// Returns the current snapshot of a specific room.
    pub async fn snapshot(&self, room_id: &RoomId) -> Result<Snapshot, RoomError> {
        self.handle(room_id).await?.snapshot().await
    }

    /// Returns the room a player is currently in, if any.
    pub async fn player_room(&self, player_id: PlayerId) -> Option<RoomId> {
        self.sessions.lock().await.lookup(&player_id)
    }

    /// Returns the number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    async fn handle(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    async fn get_or_create(&self, room_id: &RoomId) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                tracing::info!(%room_id, "room created");
                let room = Room::new(room_id.clone(), self.config.clone());
                spawn_room(room, DEFAULT_CHANNEL_SIZE)
            })
            .clone()
    }

    async fn leave_room(&self, player_id: PlayerId, room_id: &RoomId) {
        let Ok(handle) = self.handle(room_id).await else {
            return;
        };
        match handle.leave(player_id).await {
            Ok(outcome) if outcome.room_empty => self.forget(room_id, &handle).await,
            Ok(_) => {}
            Err(_) => self.forget(room_id, &handle).await,
        }
    }

    /// Drops the room entry, unless it has already been replaced by a
    /// newer room with the same id.
    async fn forget(&self, room_id: &RoomId, handle: &RoomHandle) {
        let mut rooms = self.rooms.lock().await;
        if rooms.get(room_id).is_some_and(|h| h.same_room(handle)) {
            rooms.remove(room_id);
            tracing::info!(%room_id, "room destroyed");
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
