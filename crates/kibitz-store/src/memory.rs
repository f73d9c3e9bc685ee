//! In-memory [`Store`] implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{Store, StoreError};

/// A process-local store. Entries honor their TTL but naturally don't
/// survive a restart — useful for tests and for running without a
/// durable backend.
///
/// Expired entries are reclaimed on every `save` and `load_all`, so the
/// map never accumulates dead rooms.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

fn purge_expired(entries: &mut HashMap<String, Entry>) {
    let now = Instant::now();
    entries.retain(|_, e| e.expires_at > now);
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let mut entries =
            self.entries.lock().expect("store mutex poisoned");
        purge_expired(&mut entries);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries =
            self.entries.lock().expect("store mutex poisoned");
        purge_expired(&mut entries);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn load_all(&self) -> Result<HashMap<String, String>, StoreError> {
        let mut entries =
            self.entries.lock().expect("store mutex poisoned");
        purge_expired(&mut entries);
        Ok(entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load_all() {
        let store = MemoryStore::new();
        store
            .save("room-a", "fen:xyz", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .save("room-b", "pgn:1. e4", Duration::from_secs(60))
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["room-a"], "fen:xyz");
        assert_eq!(all["room-b"], "pgn:1. e4");
    }

    #[tokio::test]
    async fn test_save_replaces_and_refreshes() {
        let store = MemoryStore::new();
        store
            .save("room-a", "v1", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .save("room-a", "v2", Duration::from_secs(60))
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["room-a"], "v2");
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let store = MemoryStore::new();
        store
            .save("stale", "v", Duration::ZERO)
            .await
            .unwrap();
        store
            .save("fresh", "v", Duration::from_secs(60))
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("fresh"));
    }

    #[tokio::test]
    async fn test_expired_entries_are_reclaimed_not_just_hidden() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .save(&format!("gone-{i}"), "v", Duration::ZERO)
                .await
                .unwrap();
        }

        store.load_all().await.unwrap();
        assert_eq!(
            store.entries.lock().unwrap().len(),
            0,
            "expired entries must leave the map entirely"
        );

        // A save purges too; only the live key remains behind it.
        store
            .save("dead", "v", Duration::ZERO)
            .await
            .unwrap();
        store
            .save("live", "v", Duration::from_secs(60))
            .await
            .unwrap();
        let raw = store.entries.lock().unwrap().len();
        assert_eq!(raw, 1);
    }
}
