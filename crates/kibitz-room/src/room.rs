//! One room: a single shared game, its attached clients, and its
//! eviction timer.
//!
//! Every mutating operation — attach, detach, move, resignation, expiry
//! confirmation — runs under one per-room `tokio::sync::Mutex`. Game
//! mutation is cheap and rare enough that a coarse per-room lock is
//! simpler than fine-grained locking and makes the two core invariants
//! trivial to uphold:
//!
//! - at most one mutation of game state is in flight at any instant;
//! - the idle timer is armed iff the attached-channel set is empty.
//!
//! Broadcast pushes and persistence writes are fire-and-forget: neither
//! blocks, fails, or reorders the operation that triggered them.

use std::sync::Arc;

use kibitz_lifecycle::IdleTimer;
use kibitz_protocol::{RoomId, Side, Update};
use kibitz_store::Store;
use tokio::sync::{mpsc, Mutex};

use crate::{ClientChannel, Outbound, RoomConfig, Ruleset};
use crate::channel::ChannelId;

/// Upper bound on consecutive forced replies auto-played after one
/// accepted move. Guarantees termination even against a ruleset defect
/// that reports a single legal move indefinitely.
const MAX_FORCED_REPLIES: usize = 10;

/// State behind the room's mutation lock.
struct RoomInner<R: Ruleset> {
    position: R::Position,
    /// Accepted move tokens, in order.
    moves: Vec<String>,
    /// Initial position plus one entry per accepted move. Resignations
    /// end the game but add no position.
    positions: Vec<R::Position>,
    channels: Vec<ClientChannel>,
    timer: IdleTimer<RoomId>,
}

/// One live game room.
///
/// Constructed only by the [`SessionRegistry`](crate::SessionRegistry);
/// always handled as an `Arc`. A caller may keep using its `Arc` after
/// the registry dropped the entry — such a room has no clients and
/// broadcasts to nobody, so the stale reference is harmless.
pub struct Room<R: Ruleset> {
    id: RoomId,
    custom: bool,
    config: RoomConfig,
    store: Option<Arc<dyn Store>>,
    inner: Mutex<RoomInner<R>>,
}

impl<R: Ruleset> Room<R> {
    /// Creates a room around `position` with its timer armed — rooms
    /// always start with zero attached clients.
    pub(crate) fn new(
        id: RoomId,
        position: R::Position,
        custom: bool,
        config: RoomConfig,
        store: Option<Arc<dyn Store>>,
        expiry_tx: mpsc::UnboundedSender<RoomId>,
    ) -> Arc<Self> {
        let mut timer =
            IdleTimer::new(id.clone(), config.idle_timeout, expiry_tx);
        timer.arm();

        Arc::new(Self {
            id,
            custom,
            config,
            store,
            inner: Mutex::new(RoomInner {
                positions: vec![position.clone()],
                position,
                moves: Vec::new(),
                channels: Vec::new(),
                timer,
            }),
        })
    }

    /// The room's identifier.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Whether the room was seeded from a custom board position.
    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// Attaches a client channel.
    ///
    /// The new channel immediately receives a catch-up snapshot
    /// reflecting every move accepted before the attach completed — a
    /// joining viewer sees current state without waiting for the next
    /// move. Everyone (the newcomer included) gets the updated viewer
    /// count, and the eviction timer is disarmed.
    pub async fn attach(&self, channel: ClientChannel) {
        let mut inner = self.inner.lock().await;
        inner.timer.disarm();

        channel.push(Outbound::Update(self.snapshot_locked(&inner)));
        inner.channels.push(channel);

        let count = inner.channels.len();
        tracing::info!(room_id = %self.id, viewers = count, "client attached");
        broadcast(&inner.channels, Outbound::Viewers(count as u32));
    }

    /// Detaches the channel with the given id. Unknown ids are ignored.
    ///
    /// When the last client leaves, the eviction timer is armed with the
    /// full configured duration.
    pub async fn detach(&self, channel_id: ChannelId) {
        let mut inner = self.inner.lock().await;
        let before = inner.channels.len();
        inner.channels.retain(|c| c.id() != channel_id);
        if inner.channels.len() == before {
            return;
        }

        let count = inner.channels.len();
        tracing::info!(room_id = %self.id, viewers = count, "client detached");
        if count == 0 {
            inner.timer.arm();
        } else {
            broadcast(&inner.channels, Outbound::Viewers(count as u32));
        }
    }

    /// Applies a move. Returns `false` if the ruleset refused it — in
    /// that case nothing changed and nothing was broadcast or persisted.
    ///
    /// On acceptance, a fresh snapshot fans out to every attached
    /// channel and a persistence write is requested. If the resulting
    /// position has exactly one legal reply, the room plays it back
    /// automatically after a brief pause, repeating up to
    /// [`MAX_FORCED_REPLIES`] times to short-circuit forced sequences.
    /// The per-room lock is held throughout, so no other command can
    /// interleave with the sequence; other rooms are unaffected.
    pub async fn apply_move(&self, token: &str) -> bool {
        let mut inner = self.inner.lock().await;

        let next = match R::apply_move(&inner.position, token) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(
                    room_id = %self.id,
                    token,
                    reason,
                    "move rejected"
                );
                return false;
            }
        };
        tracing::debug!(room_id = %self.id, token, "move accepted");
        self.accept(&mut inner, token.to_string(), next);

        for _ in 0..MAX_FORCED_REPLIES {
            let (_, over) = R::status(&inner.position);
            if over {
                break;
            }
            let replies = R::legal_moves(&inner.position);
            let [reply] = replies.as_slice() else {
                break;
            };
            let reply = reply.clone();

            // Brief "thinking" pause so viewers can follow the sequence.
            tokio::time::sleep(self.config.reply_delay).await;

            match R::apply_move(&inner.position, &reply) {
                Ok(next) => {
                    tracing::debug!(
                        room_id = %self.id,
                        token = %reply,
                        "forced reply auto-played"
                    );
                    self.accept(&mut inner, reply, next);
                }
                Err(reason) => {
                    // The ruleset contradicted its own legal_moves.
                    tracing::warn!(
                        room_id = %self.id,
                        token = %reply,
                        reason,
                        "forced reply refused by ruleset"
                    );
                    break;
                }
            }
        }

        true
    }

    /// Resigns on behalf of `side` and broadcasts the terminal
    /// snapshot. No-op if the game is already over.
    pub async fn apply_resign(&self, side: Side) {
        let mut inner = self.inner.lock().await;
        let (_, over) = R::status(&inner.position);
        if over {
            return;
        }

        inner.position = R::resign(&inner.position, side);
        tracing::info!(room_id = %self.id, %side, "resignation");

        self.request_persist_locked(&inner);
        let snapshot = self.snapshot_locked(&inner);
        broadcast(&inner.channels, Outbound::Update(snapshot));
    }

    /// The full ordered move/position history, for downstream rendering
    /// (e.g. a replay GIF). Read under the mutation lock, so it can
    /// never observe a half-applied move.
    pub async fn history(&self) -> (Vec<String>, Vec<R::Position>) {
        let inner = self.inner.lock().await;
        (inner.moves.clone(), inner.positions.clone())
    }

    /// A fresh snapshot of the current state.
    pub async fn snapshot(&self) -> Arc<Update> {
        let inner = self.inner.lock().await;
        self.snapshot_locked(&inner)
    }

    /// Confirms an idle-timer expiry under the mutation lock.
    ///
    /// Returns `true` iff the room still has zero attached clients and
    /// the timer was still armed — the registry deletes the entry only
    /// on a `true` here, so an attach racing the expiry always wins.
    pub async fn try_expire(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.channels.is_empty() {
            return false;
        }
        inner.timer.fire()
    }

    /// Requests a fire-and-forget persistence write of the current
    /// state. Used by the registry right after room creation.
    pub async fn request_persist(&self) {
        let inner = self.inner.lock().await;
        self.request_persist_locked(&inner);
    }

    /// Number of attached clients.
    pub async fn client_count(&self) -> usize {
        self.inner.lock().await.channels.len()
    }

    /// Whether the eviction timer is currently counting down. The
    /// invariant: armed iff `client_count` is zero.
    pub async fn is_timer_armed(&self) -> bool {
        self.inner.lock().await.timer.is_armed()
    }

    /// Records an accepted move: advance the position, extend the
    /// history, request persistence, broadcast a fresh snapshot.
    fn accept(
        &self,
        inner: &mut RoomInner<R>,
        token: String,
        next: R::Position,
    ) {
        inner.position = next;
        inner.moves.push(token);
        inner.positions.push(inner.position.clone());

        self.request_persist_locked(inner);
        let snapshot = self.snapshot_locked(inner);
        broadcast(&inner.channels, Outbound::Update(snapshot));
    }

    /// Builds an immutable snapshot of the current state.
    fn snapshot_locked(&self, inner: &RoomInner<R>) -> Arc<Update> {
        let (status, game_over) = R::status(&inner.position);
        Arc::new(Update {
            board: R::board(&inner.position),
            last_move: R::last_move(&inner.position),
            status,
            game_over,
            turn: R::turn(&inner.position),
            check: R::check_square(&inner.position),
            opening: R::opening(&inner.position),
        })
    }

    /// Spawns a best-effort persistence write of the serialized state.
    /// Failures are logged and never affect the triggering operation.
    fn request_persist_locked(&self, inner: &RoomInner<R>) {
        let Some(store) = &self.store else {
            return;
        };
        let store = Arc::clone(store);
        let key = self.id.clone();
        let value = R::serialize(&inner.position, self.custom);
        let ttl = self.config.idle_timeout;

        tokio::spawn(async move {
            if let Err(e) = store.save(key.as_str(), &value, ttl).await {
                tracing::warn!(
                    room_id = %key,
                    error = %e,
                    "persistence write failed"
                );
            }
        });
    }
}

/// Pushes one notice to every channel. Each push is a non-blocking send
/// into that channel's private queue, so one slow client cannot delay
/// the rest.
fn broadcast(channels: &[ClientChannel], notice: Outbound) {
    for channel in channels {
        channel.push(notice.clone());
    }
}
