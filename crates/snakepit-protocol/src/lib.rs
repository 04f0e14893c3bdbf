//! Wire protocol for Snakepit.
//!
//! This crate defines the "language" that browser clients and the server
//! speak:
//!
//! - **Records** ([`Player`], [`Snake`], [`Food`], [`Snapshot`]): the
//!   room state as it is serialized to clients.
//! - **Messages** ([`ClientCommand`], [`ServerEvent`], [`Envelope`]):
//!   what flows in each direction.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms; it only
//! knows shapes.
//!
//! ```text
//! Transport (bytes) → Protocol (commands/events) → Room (game state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientCommand, Direction, Envelope, Food, GRID_SIZE, PROTOCOL_VERSION,
    Player, PlayerId, Position, Recipient, RoomId, Roster, ServerEvent, Snake,
    Snapshot,
};
