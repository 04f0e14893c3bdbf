//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating frames.
///
/// Every variant here is a client-side mistake or a programming error on
/// the encode path. The server never answers a `ProtocolError` with a
/// broadcast: the offending frame is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown command type,
    /// missing fields, or a value outside its enum (e.g. `"north"`).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but violates protocol rules, such as a join
    /// with an empty room id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
