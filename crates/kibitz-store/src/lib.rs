//! Best-effort persistence boundary for Kibitz.
//!
//! Rooms survive a process restart by writing their serialized game
//! state to a [`Store`] after every accepted change. The engine never
//! depends on a write completing: persistence is requested, not awaited,
//! and a dead backend degrades the server to in-memory operation.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`] — in-process map, used by tests and as a stand-in
//!   when no durable backend is configured.
//! - [`FileStore`] — one JSON file per room under a root directory.
//!
//! A Redis-style backend implements the same two-method trait.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// A durable key→value map with expiring entries.
///
/// `async_trait` keeps the trait object-safe — the registry holds an
/// `Arc<dyn Store>` so backends can be chosen at startup.
#[async_trait]
pub trait Store: Send + Sync {
    /// Writes `value` under `key`, replacing any previous value. The
    /// entry expires `ttl` from now; a later `save` on the same key
    /// refreshes it.
    async fn save(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Returns every non-expired entry.
    async fn load_all(&self) -> Result<HashMap<String, String>, StoreError>;
}
