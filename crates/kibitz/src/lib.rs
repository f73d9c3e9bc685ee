//! # Kibitz
//!
//! A real-time chess spectating server. Any number of viewers join a
//! room over WebSocket, watch moves as they happen, and submit their
//! own; rooms persist across restarts and quietly age out once nobody
//! is watching.
//!
//! Bring a rule engine by implementing [`Ruleset`](kibitz_room::Ruleset),
//! then:
//!
//! ```rust,ignore
//! use kibitz::prelude::*;
//!
//! kibitz::init_tracing();
//! let server = KibitzServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build::<MyRules>()
//!     .await?;
//! server.restore().await;
//! server.run().await
//! ```

mod error;
mod handler;
mod server;

pub use error::KibitzError;
pub use server::{KibitzServer, KibitzServerBuilder};

/// One-import surface for server binaries.
pub mod prelude {
    pub use crate::{KibitzError, KibitzServer, KibitzServerBuilder};
    pub use kibitz_protocol::{
        ClientCommand, JsonCodec, RoomId, ServerNotice, Side, Update,
    };
    pub use kibitz_room::{RoomConfig, Ruleset, SessionRegistry};
    pub use kibitz_store::{FileStore, MemoryStore, Store};
}

/// Installs a `tracing` subscriber reading the `RUST_LOG` filter, with
/// an `info` default.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
