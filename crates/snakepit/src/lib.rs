//! # Snakepit
//!
//! Authoritative multiplayer grid-snake server.
//!
//! Browser clients connect over WebSocket, join a named room, and steer
//! their snake. Every room runs its own 100 ms simulation and pushes
//! snapshots back to its players. The layers are:
//!
//! ```text
//! Transport (bytes) → Protocol (commands/events) → Room (game state)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snakepit::prelude::*;
//!
//! # async fn start() -> Result<(), SnakepitError> {
//! let server = SnakepitServer::builder()
//!     .bind("0.0.0.0:10555")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::SnakepitError;
pub use server::{DEFAULT_BIND_ADDR, SnakepitServer, SnakepitServerBuilder};

/// Everything needed to run a server or talk to one in tests.
pub mod prelude {
    pub use crate::{DEFAULT_BIND_ADDR, SnakepitError, SnakepitServer, SnakepitServerBuilder};
    pub use snakepit_protocol::{
        ClientCommand, Direction, Envelope, GRID_SIZE, PROTOCOL_VERSION, PlayerId, RoomId,
        ServerEvent, Snapshot,
    };
    pub use snakepit_room::{RoomConfig, RoomPhase};
}
