//! Per-connection handler: decode commands, route them, stream events.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The connection id doubles as the player's
//! identity. The task multiplexes two sources with `select!`:
//!   1. Frames from the client → decoded into [`ClientCommand`]s.
//!   2. Events from the player's room → wrapped in an [`Envelope`] and sent.
//!
//! When the socket closes the player is removed from its room before the
//! task exits.

use std::sync::Arc;

use snakepit_protocol::{ClientCommand, Codec, Envelope, PlayerId, ServerEvent};
use snakepit_room::{PlayerCommand, PlayerSender, RoomError};
use snakepit_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::SnakepitError;
use crate::server::ServerState;

/// Removes the player from its room when the handler exits.
///
/// The normal path awaits [`release`](Self::release). If the handler
/// unwinds instead, `Drop` spawns the removal since it cannot await.
struct DisconnectGuard {
    player_id: PlayerId,
    state: Option<Arc<ServerState>>,
}

impl DisconnectGuard {
    fn new(player_id: PlayerId, state: Arc<ServerState>) -> Self {
        Self {
            player_id,
            state: Some(state),
        }
    }

    async fn release(mut self) {
        if let Some(state) = self.state.take() {
            state.rooms.disconnect(self.player_id).await;
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            let player_id = self.player_id;
            tokio::spawn(async move {
                state.rooms.disconnect(player_id).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), SnakepitError> {
    let conn_id = conn.id();
    let player_id = PlayerId(conn_id.into_inner());
    tracing::debug!(%conn_id, %player_id, "handling new connection");

    let guard = DisconnectGuard::new(player_id, Arc::clone(&state));
    let result = run_session(&conn, &state, player_id).await;
    guard.release().await;

    if let Err(e) = conn.close().await {
        tracing::debug!(%player_id, error = %e, "close failed");
    }
    tracing::info!(%player_id, "player disconnected");
    result
}

async fn run_session(
    conn: &WebSocketConnection,
    state: &ServerState,
    player_id: PlayerId,
) -> Result<(), SnakepitError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            incoming = conn.recv() => match incoming? {
                Some(data) => handle_frame(state, player_id, &tx, &data).await,
                None => {
                    tracing::debug!(%player_id, "connection closed by client");
                    return Ok(());
                }
            },
            Some(event) = rx.recv() => {
                let envelope = Envelope::new(next_seq(&mut seq), event);
                let bytes = state.codec.encode(&envelope)?;
                conn.send(&bytes).await?;
            }
        }
    }
}

/// Decodes one frame and applies it. Bad frames and refused commands are
/// logged and dropped; the connection stays open.
async fn handle_frame(state: &ServerState, player_id: PlayerId, tx: &PlayerSender, data: &[u8]) {
    let command = match decode_command(&state.codec, data) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "ignoring malformed frame");
            return;
        }
    };

    match command {
        ClientCommand::JoinGame { room_id, name } => {
            match state.rooms.join(player_id, room_id, name, tx.clone()).await {
                Ok(kind) => tracing::debug!(%player_id, ?kind, "join accepted"),
                Err(RoomError::RoomFull(room_id)) => {
                    tracing::info!(%player_id, %room_id, "room full, join rejected");
                    // The receiver lives in this task's select loop.
                    let _ = tx.send(ServerEvent::GameFull);
                }
                Err(e) => tracing::debug!(%player_id, error = %e, "join failed"),
            }
        }
        ClientCommand::ChangeDirection(direction) => {
            route(state, player_id, PlayerCommand::ChangeDirection(direction)).await;
        }
        ClientCommand::StartGame => route(state, player_id, PlayerCommand::StartGame).await,
        ClientCommand::ResetGame => route(state, player_id, PlayerCommand::ResetGame).await,
    }
}

fn decode_command(codec: &impl Codec, data: &[u8]) -> Result<ClientCommand, SnakepitError> {
    let command: ClientCommand = codec.decode(data)?;
    Ok(command.validated()?)
}

async fn route(state: &ServerState, player_id: PlayerId, command: PlayerCommand) {
    if let Err(e) = state.rooms.route(player_id, command).await {
        tracing::debug!(%player_id, ?command, error = %e, "command ignored");
    }
}

/// Returns the next outbound sequence number. The first is 1.
fn next_seq(seq: &mut u64) -> u64 {
    *seq += 1;
    *seq
}
