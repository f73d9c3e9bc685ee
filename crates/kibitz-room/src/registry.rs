//! Session registry: the concurrent directory of live rooms.
//!
//! One registry exists per process, constructed at startup and passed
//! explicitly to whatever needs to create or find rooms — it is an
//! object, not ambient global state. The identifier→room map is a
//! sharded concurrent map: lookups and insert-if-absent never take a
//! registry-wide lock.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kibitz_protocol::RoomId;
use kibitz_store::Store;
use rand::Rng;
use tokio::sync::mpsc;

use crate::{RegistryError, Room, RoomConfig, Ruleset};

/// Alphabet for generated room ids. 62 symbols over 6 characters gives
/// well above 36^6 combinations, so collision retries are O(1) in
/// expectation.
const ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LENGTH: usize = 6;

fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| {
            let i = rng.random_range(0..ID_ALPHABET.len());
            ID_ALPHABET[i] as char
        })
        .collect()
}

/// Concurrent mapping from room identifier to live [`Room`].
///
/// Entries appear via [`create`](Self::create),
/// [`get_or_create`](Self::get_or_create), and
/// [`restore`](Self::restore); they disappear only when a room's idle
/// timer fires with zero attached clients (or via an explicit
/// [`delete`](Self::delete)). An existing entry is never silently
/// overwritten — id generation retries on collision instead.
pub struct SessionRegistry<R: Ruleset> {
    config: RoomConfig,
    rooms: DashMap<RoomId, Arc<Room<R>>>,
    store: Option<Arc<dyn Store>>,
    expiry_tx: mpsc::UnboundedSender<RoomId>,
}

impl<R: Ruleset> SessionRegistry<R> {
    /// Creates the registry and spawns its eviction task.
    pub fn new(
        config: RoomConfig,
        store: Option<Arc<dyn Store>>,
    ) -> Arc<Self> {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            config,
            rooms: DashMap::new(),
            store,
            expiry_tx,
        });
        tokio::spawn(reap_expired(Arc::downgrade(&registry), expiry_rx));
        registry
    }

    /// Creates a room from a state spec and returns its fresh id.
    ///
    /// An empty spec means the standard starting position; non-empty
    /// specs produce `custom-`-prefixed ids for URL readability. The
    /// initial state is persisted fire-and-forget — a store failure is
    /// logged, never surfaced.
    pub fn create(&self, spec: &str) -> Result<RoomId, RegistryError> {
        let (position, custom) =
            R::parse(spec).map_err(RegistryError::InvalidSpec)?;
        let prefix = if spec.is_empty() { "" } else { "custom-" };

        loop {
            let id = RoomId(format!("{prefix}{}", generate_id()));
            match self.rooms.entry(id.clone()) {
                // Collision: somebody holds this id. Retry with a new one.
                Entry::Occupied(_) => continue,
                Entry::Vacant(vacant) => {
                    let room = Room::new(
                        id.clone(),
                        position.clone(),
                        custom,
                        self.config.clone(),
                        self.store.clone(),
                        self.expiry_tx.clone(),
                    );
                    vacant.insert(Arc::clone(&room));
                    tracing::info!(room_id = %id, custom, "room created");

                    tokio::spawn(async move {
                        room.request_persist().await;
                    });
                    return Ok(id);
                }
            }
        }
    }

    /// Returns the room for `id`, creating a default-state room at that
    /// exact identifier if absent.
    ///
    /// Insert-if-absent semantics: even if many callers race on the
    /// same novel id, exactly one room is created and every caller gets
    /// the same instance.
    pub fn get_or_create(&self, id: &RoomId) -> Arc<Room<R>> {
        if let Some(room) = self.rooms.get(id) {
            return Arc::clone(&room);
        }
        let room = self.rooms.entry(id.clone()).or_insert_with(|| {
            tracing::info!(room_id = %id, "room created on first access");
            Room::new(
                id.clone(),
                R::initial(),
                false,
                self.config.clone(),
                self.store.clone(),
                self.expiry_tx.clone(),
            )
        });
        Arc::clone(&room)
    }

    /// Returns the room for `id`, if it exists.
    pub fn get(&self, id: &RoomId) -> Option<Arc<Room<R>>> {
        self.rooms.get(id).map(|r| Arc::clone(&r))
    }

    /// Removes the entry for `id`. Idempotent; no error if absent.
    ///
    /// A handler may still hold the room `Arc` afterwards — the room
    /// stays alive until the last reference drops, it is just no longer
    /// discoverable.
    pub fn delete(&self, id: &RoomId) {
        if self.rooms.remove(id).is_some() {
            tracing::info!(room_id = %id, "room deleted");
        }
    }

    /// Recreates rooms from the persistence store on startup. Returns
    /// the number of rooms restored.
    ///
    /// Individual entries that fail to parse are logged and skipped; a
    /// failing enumeration aborts the whole restore (the server starts
    /// with zero restored rooms). Restored rooms begin with their
    /// eviction timer armed.
    pub async fn restore(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let entries = match store.load_all().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "restore aborted; starting with no persisted rooms"
                );
                return 0;
            }
        };

        let mut restored = 0;
        for (key, spec) in entries {
            let id = RoomId(key);
            let (position, custom) = match R::parse(&spec) {
                Ok(parsed) => parsed,
                Err(reason) => {
                    tracing::warn!(
                        room_id = %id,
                        reason,
                        "skipping unparseable persisted room"
                    );
                    continue;
                }
            };
            let room = Room::new(
                id.clone(),
                position,
                custom,
                self.config.clone(),
                self.store.clone(),
                self.expiry_tx.clone(),
            );
            // Restore runs before the server accepts connections, so
            // pre-seeding exact ids cannot clobber live rooms.
            self.rooms.insert(id.clone(), room);
            tracing::info!(room_id = %id, "room restored from store");
            restored += 1;
        }
        restored
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Ids of all live rooms.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }
}

/// Eviction task: consumes expiry tokens from room timers and deletes
/// the rooms they name.
///
/// Each expiry is confirmed via [`Room::try_expire`] under that room's
/// own lock before the entry is removed — a token that raced a
/// concurrent attach confirms false and is dropped, so a room that just
/// gained a client is never evicted.
async fn reap_expired<R: Ruleset>(
    registry: Weak<SessionRegistry<R>>,
    mut expiry_rx: mpsc::UnboundedReceiver<RoomId>,
) {
    while let Some(id) = expiry_rx.recv().await {
        let Some(registry) = registry.upgrade() else {
            break;
        };
        // Clone the Arc out so no map shard lock is held across await.
        let Some(room) = registry.get(&id) else {
            continue;
        };
        if room.try_expire().await {
            registry.rooms.remove(&id);
            tracing::info!(room_id = %id, "idle room evicted");
        }
    }
}
