//! Session lifecycle and real-time synchronization engine for Kibitz.
//!
//! This crate is the heart of the session host: it keeps many
//! independent game rooms alive concurrently, serializes mutation of
//! each room's shared state, fans out update snapshots to every
//! attached client, and ages out rooms nobody is watching.
//!
//! # Key types
//!
//! - [`Ruleset`] — the boundary to the external rule engine
//! - [`SessionRegistry`] — concurrent directory of live rooms
//! - [`Room`] — one shared game plus its attached clients and timer
//! - [`ClientChannel`] — per-client push handle used for fan-out
//! - [`RoomConfig`] — idle timeout and forced-reply pacing

mod channel;
mod config;
mod error;
mod registry;
mod room;
mod rules;

pub use channel::{ChannelId, ClientChannel, Outbound, OutboundReceiver};
pub use config::RoomConfig;
pub use error::RegistryError;
pub use registry::SessionRegistry;
pub use room::Room;
pub use rules::Ruleset;
