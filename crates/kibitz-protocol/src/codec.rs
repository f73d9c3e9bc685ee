//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The protocol layer doesn't care how messages become frames — it only
//! needs something implementing [`Codec`]. [`JsonCodec`] is the default
//! (human-readable, debuggable in browser dev tools); a different text
//! codec can be swapped in without touching the rest of the stack.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts Rust types to text frames and back.
///
/// `Send + Sync + 'static` because a codec is shared across every
/// connection handler task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}
