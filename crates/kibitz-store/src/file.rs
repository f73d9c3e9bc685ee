//! File-backed [`Store`] implementation.
//!
//! One JSON document per key under a root directory. Expiry is recorded
//! as a unix timestamp inside the document; `load_all` deletes expired
//! files as it finds them, so the directory holds only live rooms.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::{Store, StoreError};

/// Flat-file store: `<root>/<key>.json` per entry.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct Document {
    value: String,
    expires_at_unix: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        // Keys become file names; anything that could escape the root
        // directory is rejected.
        if key.is_empty()
            || key.contains(['/', '\\'])
            || key.starts_with('.')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn save(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let doc = Document {
            value: value.to_string(),
            expires_at_unix: unix_now().saturating_add(ttl.as_secs()),
        };
        let bytes = serde_json::to_vec(&doc)?;
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<HashMap<String, String>, StoreError> {
        let mut entries = HashMap::new();
        let now = unix_now();

        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };

            let bytes = match fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable store entry");
                    continue;
                }
            };
            let doc: Document = match serde_json::from_slice(&bytes) {
                Ok(d) => d,
                Err(e) => {
                    warn!(key, error = %e, "skipping malformed store entry");
                    continue;
                }
            };
            if doc.expires_at_unix <= now {
                // Reclaim the dead file so the directory doesn't grow
                // with every room that ever existed.
                if let Err(e) = fs::remove_file(&path).await {
                    warn!(key, error = %e, "failed to remove expired entry");
                }
                continue;
            }
            entries.insert(key.to_string(), doc.value);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store
            .save("abc123", "pgn:1. e4 e5", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .save("custom-xy", "fen:8/8/8", Duration::from_secs(60))
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["abc123"], "pgn:1. e4 e5");
        assert_eq!(all["custom-xy"], "fen:8/8/8");
    }

    #[tokio::test]
    async fn test_expired_file_is_skipped_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.save("old", "v", Duration::ZERO).await.unwrap();
        let all = store.load_all().await.unwrap();
        assert!(all.is_empty());
        assert!(
            !dir.path().join("old.json").exists(),
            "expired entry should be reclaimed, not left on disk"
        );
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store
            .save("good", "v", Duration::from_secs(60))
            .await
            .unwrap();
        fs::write(dir.path().join("bad.json"), b"{{nope")
            .await
            .unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("good"));
    }

    #[tokio::test]
    async fn test_path_escaping_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let result = store
            .save("../evil", "v", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }
}
