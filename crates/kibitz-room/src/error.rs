//! Error types for the room layer.

/// Errors surfaced by [`SessionRegistry`](crate::SessionRegistry)
/// operations.
///
/// Note what is *not* here: a rejected move is a `false` return from
/// [`Room::apply_move`](crate::Room::apply_move), and persistence
/// failures are logged and swallowed — neither is an error the caller
/// ever sees.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The room-creation state spec could not be parsed. No room was
    /// created.
    #[error("invalid state spec: {0}")]
    InvalidSpec(String),
}
