//! Error types for the store layer.

/// Errors that can occur while talking to a persistence backend.
///
/// The session engine treats every one of these as non-fatal: a failed
/// `save` is logged and dropped, and a failed `load_all` aborts restore
/// with zero rooms instead of failing startup.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem or network I/O failed.
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted entry could not be encoded or decoded.
    #[error("store entry malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The key is not acceptable to this backend (e.g. contains a path
    /// separator for a file-backed store).
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
}
