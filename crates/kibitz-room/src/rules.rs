//! The [`Ruleset`] trait — the boundary to the external rule engine.
//!
//! The session engine never looks inside a position. It validates and
//! applies moves, derives snapshots, and serializes state exclusively
//! through this trait, so any chess (or chess-like) engine can be
//! plugged in without touching the room layer.

use kibitz_protocol::Side;

/// The rule-engine boundary.
///
/// Every method is a pure function of the position: `apply_move` and
/// `resign` return a *new* position rather than mutating in place, which
/// is what lets a rejected move leave room state untouched by
/// construction.
///
/// Rejection reasons are plain strings — a refused move or spec is a
/// normal outcome for the engine, not an error condition it models.
pub trait Ruleset: Send + Sync + 'static {
    /// An opaque game position. Cloned into the history on every
    /// accepted move.
    type Position: Clone + Send + Sync + 'static;

    /// The standard starting position (what an empty spec means).
    fn initial() -> Self::Position;

    /// Parses a state spec string. Returns the position and whether the
    /// spec describes a custom origin (a board position rather than a
    /// move record) — the flag controls how [`serialize`](Self::serialize)
    /// externalizes the state later.
    ///
    /// Recognized prefixes: `fen:` (board position, custom origin) and
    /// `pgn:` (game record, standard origin). An unprefixed non-empty
    /// spec is treated as a board position; an empty spec yields the
    /// standard starting position.
    fn parse(spec: &str) -> Result<(Self::Position, bool), String>;

    /// Validates `token` against `position` and returns the resulting
    /// position, or the rejection reason (illegal move, wrong turn,
    /// malformed notation, game already over).
    fn apply_move(
        position: &Self::Position,
        token: &str,
    ) -> Result<Self::Position, String>;

    /// Every legal move in `position`, as tokens accepted by
    /// [`apply_move`](Self::apply_move). Used by the forced-reply loop.
    fn legal_moves(position: &Self::Position) -> Vec<String>;

    /// Marks `side` as resigned, producing a terminal position.
    fn resign(position: &Self::Position, side: Side) -> Self::Position;

    /// Human-readable status line and whether the game is over.
    fn status(position: &Self::Position) -> (String, bool);

    /// Serializes the position to a spec string that round-trips with
    /// [`parse`](Self::parse). `custom` is the origin flag `parse`
    /// reported when the room was created.
    fn serialize(position: &Self::Position, custom: bool) -> String;

    /// Board encoding for the update snapshot (FEN or equivalent).
    fn board(position: &Self::Position) -> String;

    /// From/to squares of the last move played, if any.
    fn last_move(position: &Self::Position) -> Option<(String, String)>;

    /// Side to move.
    fn turn(position: &Self::Position) -> Side;

    /// Square of a king in check, if any.
    fn check_square(_position: &Self::Position) -> Option<String> {
        None
    }

    /// Recognized opening name for the move sequence so far, if any.
    fn opening(_position: &Self::Position) -> Option<String> {
        None
    }
}
