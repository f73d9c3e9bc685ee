//! Per-connection handler: join, subscription, and command routing.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive `Join` → resolve or create the room
//!   2. Send `Joined`, attach a client channel (catch-up fires here)
//!   3. Spawn a writer task draining room pushes into the socket
//!   4. Loop: receive commands → apply to the room
//!   5. On any exit path, detach from the room

use std::sync::Arc;
use std::time::Duration;

use kibitz_protocol::{
    ClientCommand, Codec, ProtocolError, ServerNotice,
};
use kibitz_room::{
    ChannelId, ClientChannel, Outbound, OutboundReceiver, Room, Ruleset,
};
use kibitz_transport::{Connection, WebSocketConnection};

use crate::server::ServerState;
use crate::KibitzError;

/// How long a fresh connection gets to send its `Join` frame.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that detaches the client channel when the handler exits.
///
/// This ensures the room drops the channel (and re-arms its eviction
/// timer if this was the last viewer) even if the handler errors out.
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async lock.
struct DetachGuard<R: Ruleset> {
    room: Arc<Room<R>>,
    channel_id: ChannelId,
}

impl<R: Ruleset> Drop for DetachGuard<R> {
    fn drop(&mut self) {
        let room = Arc::clone(&self.room);
        let channel_id = self.channel_id;
        tokio::spawn(async move {
            room.detach(channel_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, C>>,
) -> Result<(), KibitzError>
where
    R: Ruleset,
    C: Codec + Clone,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let room = join_room(&conn, &state).await?;
    tracing::info!(%conn_id, room_id = %room.id(), "client joined");

    let (channel, outbound_rx) = ClientChannel::subscribe();
    let channel_id = channel.id();
    room.attach(channel).await;

    let _guard = DetachGuard {
        room: Arc::clone(&room),
        channel_id,
    };
    let writer = tokio::spawn(write_outbound(
        conn.clone(),
        state.codec.clone(),
        outbound_rx,
    ));

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let command: ClientCommand = match state.codec.decode(&frame) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(
                    %conn_id, error = %e, "undecodable command"
                );
                send_notice(
                    &conn,
                    &state.codec,
                    &ServerNotice::Error {
                        message: format!("bad command: {e}"),
                    },
                )
                .await?;
                continue;
            }
        };

        match command {
            ClientCommand::Move { san } => {
                let accepted = room.apply_move(&san).await;
                send_notice(
                    &conn,
                    &state.codec,
                    &ServerNotice::MoveResult { accepted },
                )
                .await?;
            }
            ClientCommand::Resign { side } => {
                room.apply_resign(side).await;
            }
            ClientCommand::Join { .. } => {
                send_notice(
                    &conn,
                    &state.codec,
                    &ServerNotice::Error {
                        message: "already in a room".to_string(),
                    },
                )
                .await?;
            }
        }
    }

    // _guard drops here → detach fires → the room drops the channel
    // sender → the writer's queue ends and it exits on its own.
    drop(_guard);
    let _ = writer.await;
    Ok(())
}

/// Waits for the opening `Join` and resolves it to a room.
///
/// An empty room id asks for a fresh default room; any other id joins
/// the room with that exact id, creating it on first use.
async fn join_room<R, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<R, C>>,
) -> Result<Arc<Room<R>>, KibitzError>
where
    R: Ruleset,
    C: Codec,
{
    let frame =
        match tokio::time::timeout(JOIN_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                return Err(ProtocolError::InvalidMessage(
                    "connection closed before join".into(),
                )
                .into());
            }
            Ok(Err(e)) => return Err(KibitzError::Transport(e)),
            Err(_) => {
                return Err(ProtocolError::InvalidMessage(
                    "join timed out".into(),
                )
                .into());
            }
        };

    let command: ClientCommand = state.codec.decode(&frame)?;
    let ClientCommand::Join { room: id } = command else {
        send_notice(
            conn,
            &state.codec,
            &ServerNotice::Error {
                message: "first command must be Join".to_string(),
            },
        )
        .await?;
        return Err(ProtocolError::InvalidMessage(
            "first command must be Join".into(),
        )
        .into());
    };

    let (id, room) = if id.is_empty() {
        let id = state.registry.create("")?;
        let room = state.registry.get_or_create(&id);
        (id, room)
    } else {
        let room = state.registry.get_or_create(&id);
        (id, room)
    };

    send_notice(
        conn,
        &state.codec,
        &ServerNotice::Joined { room: id },
    )
    .await?;
    Ok(room)
}

/// Writer task: drains room pushes into the socket until the channel
/// ends or the peer goes away.
async fn write_outbound<C: Codec>(
    conn: WebSocketConnection,
    codec: C,
    mut outbound_rx: OutboundReceiver,
) {
    while let Some(outbound) = outbound_rx.recv().await {
        let notice = match outbound {
            Outbound::Update(update) => {
                ServerNotice::Update((*update).clone())
            }
            Outbound::Viewers(count) => ServerNotice::Viewers { count },
        };
        let frame = match codec.encode(&notice) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode notice");
                continue;
            }
        };
        if conn.send(&frame).await.is_err() {
            break;
        }
    }
}

/// Encodes and sends one notice on the connection.
async fn send_notice(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    notice: &ServerNotice,
) -> Result<(), KibitzError> {
    let frame = codec.encode(notice)?;
    conn.send(&frame).await.map_err(KibitzError::Transport)
}
