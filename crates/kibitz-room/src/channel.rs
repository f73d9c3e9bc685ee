//! Per-client push channels.
//!
//! From a room's perspective a connected client is nothing but a
//! [`ClientChannel`]: a handle it can push outbound notices into. The
//! channel is unbounded, so fan-out to N clients is N non-blocking
//! sends — a slow or dead receiver can never stall broadcast to the
//! others. The transport layer owns the receiving half and drains it
//! into the socket at whatever pace the client sustains.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kibitz_protocol::Update;
use tokio::sync::mpsc;

/// Counter for generating unique channel ids.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one attached channel within a room. Used for detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// A notice pushed from a room to one client.
///
/// Snapshots travel as `Arc<Update>` — one immutable snapshot is shared
/// across every channel in a broadcast.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A fresh state snapshot.
    Update(Arc<Update>),
    /// Current number of attached clients.
    Viewers(u32),
}

/// Receiving half of a client channel, held by the transport layer.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// The room-side handle for one connected client.
pub struct ClientChannel {
    id: ChannelId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ClientChannel {
    /// Creates a channel pair: the sender half to attach to a room, and
    /// the receiver half for the transport to drain.
    pub fn subscribe() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
        (Self { id, tx }, rx)
    }

    /// This channel's unique id.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Pushes a notice. Silently drops it if the receiver is gone —
    /// a disconnected client is detached shortly after anyway.
    pub(crate) fn push(&self, notice: Outbound) {
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ids_are_unique() {
        let (a, _rx_a) = ClientChannel::subscribe();
        let (b, _rx_b) = ClientChannel::subscribe();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_push_after_receiver_dropped_is_silent() {
        let (ch, rx) = ClientChannel::subscribe();
        drop(rx);
        ch.push(Outbound::Viewers(1)); // must not panic
    }
}
