//! Wire protocol for Kibitz.
//!
//! This crate defines the "language" that clients and the session host
//! speak:
//!
//! - **Types** ([`RoomId`], [`Update`], [`ClientCommand`],
//!   [`ServerNotice`]) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! The protocol layer sits between transport (raw frames) and the room
//! layer (game state). It knows nothing about connections or rooms —
//! only how to serialize and deserialize messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientCommand, RoomId, ServerNotice, Side, Update};
