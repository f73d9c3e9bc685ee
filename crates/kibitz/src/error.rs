//! Unified error type for the Kibitz server.

use kibitz_protocol::ProtocolError;
use kibitz_room::RegistryError;
use kibitz_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `kibitz` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KibitzError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (unparseable state spec).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
