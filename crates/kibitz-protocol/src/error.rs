//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed — malformed JSON, missing fields,
    /// wrong data types, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but violates protocol rules — e.g. a
    /// command sent before `Join`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
