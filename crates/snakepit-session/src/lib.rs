//! Player session tracking for Snakepit.
//!
//! A connection's identity is the [`PlayerId`](snakepit_protocol::PlayerId)
//! the server assigns it. This crate remembers which room each identity
//! currently belongs to, so the server can route commands and clean up on
//! disconnect.
//!
//! ```text
//! Room Layer (above)     ← asks "which room is this player in?"
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below) ← provides PlayerId, RoomId
//! ```

mod registry;

pub use registry::SessionRegistry;
