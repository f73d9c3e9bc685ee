//! Core protocol types for Kibitz's wire format.
//!
//! Everything a client and the session host exchange is defined here:
//! room identifiers, the two inbound commands (move, resign), and the
//! update snapshot that fans out to every attached viewer.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An opaque identifier for a room (one live game).
///
/// Room ids are short random string tokens, generated server-side.
/// Custom rooms (seeded from a position or game record) carry a
/// `custom-` prefix; the prefix is purely for URL readability and has
/// no behavioral meaning.
///
/// `#[serde(transparent)]` makes a `RoomId` serialize as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty id, which clients send to request
    /// a freshly created room.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The side a player commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// The opposing side.
    pub fn other(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// Update snapshot
// ---------------------------------------------------------------------------

/// An immutable snapshot of a room's game state at a point in time.
///
/// Produced fresh after every accepted state change and once for each
/// newly attached client (catch-up). Never mutated after creation, so a
/// single snapshot is safe to hand to many channels concurrently — the
/// room layer wraps it in an `Arc` for exactly that reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Board encoding (FEN or equivalent, ruleset-defined).
    pub board: String,

    /// From/to squares of the last accepted move, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<(String, String)>,

    /// Human-readable status line ("White to move", "Checkmate", ...).
    pub status: String,

    /// `true` once the game has reached a terminal state.
    pub game_over: bool,

    /// Whose turn it is. Meaningless once `game_over` is set.
    pub turn: Side,

    /// Square of a king currently in check, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    /// Recognized opening name, when the move sequence matches one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands and notices
// ---------------------------------------------------------------------------

/// Messages a client sends to the session host.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON
/// (`{ "type": "Move", "san": "e4" }`), which is the friendliest shape
/// for browser clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// First frame on every connection: which room to enter.
    /// An empty id asks the server to create a fresh default room.
    Join { room: RoomId },

    /// Submit a move in the ruleset's token notation.
    Move { san: String },

    /// Resign on behalf of the given side.
    Resign { side: Side },
}

/// Messages the session host pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerNotice {
    /// Acknowledges a `Join`, echoing the resolved room id.
    Joined { room: RoomId },

    /// Outcome of the client's own `Move` command. A rejected move is
    /// a normal outcome, not an error — the client snaps the piece back.
    MoveResult { accepted: bool },

    /// A fresh state snapshot (broadcast, plus one on attach).
    Update(Update),

    /// Number of clients currently attached to the room.
    Viewers { count: u32 },

    /// A protocol-level problem with the client's last frame.
    Error { message: String },
}
