//! Integration tests for the Kibitz server: join flow, command routing,
//! and fan-out over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kibitz::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Mock ruleset
// =========================================================================

/// Accepts any four-character square-pair token; `Resign` ends the game.
struct AnyMove;

#[derive(Clone)]
struct AnyPosition {
    moves: Vec<String>,
    resigned: Option<Side>,
}

impl Ruleset for AnyMove {
    type Position = AnyPosition;

    fn initial() -> AnyPosition {
        AnyPosition {
            moves: Vec::new(),
            resigned: None,
        }
    }

    fn parse(spec: &str) -> Result<(AnyPosition, bool), String> {
        if spec.is_empty() {
            Ok((Self::initial(), false))
        } else {
            Err(format!("unsupported spec: {spec}"))
        }
    }

    fn apply_move(
        position: &AnyPosition,
        token: &str,
    ) -> Result<AnyPosition, String> {
        if Self::status(position).1 {
            return Err("game is over".to_string());
        }
        if token.len() != 4 || !token.is_ascii() {
            return Err(format!("bad token: {token}"));
        }
        let mut next = position.clone();
        next.moves.push(token.to_string());
        Ok(next)
    }

    fn legal_moves(position: &AnyPosition) -> Vec<String> {
        if Self::status(position).1 {
            Vec::new()
        } else {
            vec!["a2a3".to_string(), "b2b3".to_string()]
        }
    }

    fn resign(position: &AnyPosition, side: Side) -> AnyPosition {
        let mut next = position.clone();
        next.resigned = Some(side);
        next
    }

    fn status(position: &AnyPosition) -> (String, bool) {
        match position.resigned {
            Some(side) => (format!("{side} resigned"), true),
            None => (format!("{} to move", Self::turn(position)), false),
        }
    }

    fn serialize(position: &AnyPosition, _custom: bool) -> String {
        position.moves.join(" ")
    }

    fn board(position: &AnyPosition) -> String {
        format!("board after {} moves", position.moves.len())
    }

    fn last_move(position: &AnyPosition) -> Option<(String, String)> {
        position
            .moves
            .last()
            .map(|m| (m[..2].to_string(), m[2..].to_string()))
    }

    fn turn(position: &AnyPosition) -> Side {
        if position.moves.len() % 2 == 0 {
            Side::White
        } else {
            Side::Black
        }
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = KibitzServerBuilder::new()
        .bind("127.0.0.1:0")
        .build::<AnyMove>()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

fn text_frame(notice: &impl serde::Serialize) -> Message {
    Message::Text(serde_json::to_string(notice).expect("encode").into())
}

async fn next_notice(ws: &mut ClientWs) -> ServerNotice {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("notice should arrive in time")
        .expect("stream should not end")
        .expect("frame should be readable");
    serde_json::from_str(msg.into_text().expect("text frame").as_str())
        .expect("decode notice")
}

/// Joins the given room (empty id means "create one") and returns the
/// resolved room id, after draining the catch-up snapshot and viewer
/// count that follow.
async fn join(ws: &mut ClientWs, room: &str) -> RoomId {
    ws.send(text_frame(&ClientCommand::Join {
        room: RoomId::from(room),
    }))
    .await
    .expect("send join");

    let ServerNotice::Joined { room: id } = next_notice(ws).await else {
        panic!("expected Joined first");
    };
    let ServerNotice::Update(_) = next_notice(ws).await else {
        panic!("expected catch-up Update after Joined");
    };
    let ServerNotice::Viewers { .. } = next_notice(ws).await else {
        panic!("expected Viewers after catch-up");
    };
    id
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_empty_id_creates_room() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let id = join(&mut ws, "").await;
    assert_eq!(id.as_str().len(), 6);
}

#[tokio::test]
async fn test_join_named_room_and_move() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let id = join(&mut ws, "friday-blitz").await;
    assert_eq!(id.as_str(), "friday-blitz");

    ws.send(text_frame(&ClientCommand::Move { san: "e2e4".into() }))
        .await
        .expect("send move");

    // MoveResult (direct reply) and Update (broadcast) may arrive in
    // either order.
    let mut saw_result = false;
    let mut saw_update = false;
    for _ in 0..2 {
        match next_notice(&mut ws).await {
            ServerNotice::MoveResult { accepted } => {
                assert!(accepted);
                saw_result = true;
            }
            ServerNotice::Update(update) => {
                assert_eq!(
                    update.last_move,
                    Some(("e2".to_string(), "e4".to_string()))
                );
                saw_update = true;
            }
            other => panic!("unexpected notice: {other:?}"),
        }
    }
    assert!(saw_result && saw_update);
}

#[tokio::test]
async fn test_rejected_move_gets_result_but_no_update() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "").await;

    ws.send(text_frame(&ClientCommand::Move {
        san: "definitely not a move".into(),
    }))
    .await
    .expect("send move");

    match next_notice(&mut ws).await {
        ServerNotice::MoveResult { accepted } => assert!(!accepted),
        other => panic!("expected MoveResult, got {other:?}"),
    }

    // Nothing else should follow; probe with an accepted move.
    ws.send(text_frame(&ClientCommand::Move { san: "g1f3".into() }))
        .await
        .expect("send move");
    for _ in 0..2 {
        match next_notice(&mut ws).await {
            ServerNotice::MoveResult { accepted } => assert!(accepted),
            ServerNotice::Update(update) => {
                assert_eq!(
                    update.last_move,
                    Some(("g1".to_string(), "f3".to_string()))
                );
            }
            other => panic!("unexpected notice: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_first_command_must_be_join() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(text_frame(&ClientCommand::Move { san: "e2e4".into() }))
        .await
        .expect("send");

    match next_notice(&mut ws).await {
        ServerNotice::Error { message } => {
            assert!(message.contains("Join"));
        }
        other => panic!("expected Error, got {other:?}"),
    }

    // The server hangs up after a bad opening.
    let result =
        tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_garbage_command_mid_session_is_survivable() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "").await;

    ws.send(Message::Text("not json".to_string().into()))
        .await
        .expect("send garbage");
    match next_notice(&mut ws).await {
        ServerNotice::Error { .. } => {}
        other => panic!("expected Error, got {other:?}"),
    }

    // Connection is still usable.
    ws.send(text_frame(&ClientCommand::Move { san: "e2e4".into() }))
        .await
        .expect("send move");
    for _ in 0..2 {
        match next_notice(&mut ws).await {
            ServerNotice::MoveResult { accepted } => assert!(accepted),
            ServerNotice::Update(_) => {}
            other => panic!("unexpected notice: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_second_join_is_refused() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "").await;

    ws.send(text_frame(&ClientCommand::Join {
        room: RoomId::from("elsewhere"),
    }))
    .await
    .expect("send");

    match next_notice(&mut ws).await {
        ServerNotice::Error { message } => {
            assert!(message.contains("already"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_two_viewers_share_one_game() {
    let addr = start_server().await;

    let mut ws1 = connect(&addr).await;
    let id = join(&mut ws1, "shared").await;

    let mut ws2 = connect(&addr).await;
    let id2 = join(&mut ws2, id.as_str()).await;
    assert_eq!(id2, id);

    // The first viewer learns about the second.
    match next_notice(&mut ws1).await {
        ServerNotice::Viewers { count } => assert_eq!(count, 2),
        other => panic!("expected Viewers, got {other:?}"),
    }

    // A move by viewer 1 reaches viewer 2.
    ws1.send(text_frame(&ClientCommand::Move { san: "d2d4".into() }))
        .await
        .expect("send move");

    match next_notice(&mut ws2).await {
        ServerNotice::Update(update) => {
            assert_eq!(
                update.last_move,
                Some(("d2".to_string(), "d4".to_string()))
            );
            assert_eq!(update.turn, Side::Black);
        }
        other => panic!("expected Update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_viewer_still_receives_pushes() {
    let addr = start_server().await;

    // Viewer 1 joins and then sends nothing at all.
    let mut idle = connect(&addr).await;
    let id = join(&mut idle, "quiet-corner").await;

    // Viewer 2 joins the same room and plays two moves.
    let mut active = connect(&addr).await;
    join(&mut active, id.as_str()).await;
    for san in ["e2e4", "e7e5"] {
        active
            .send(text_frame(&ClientCommand::Move { san: san.into() }))
            .await
            .expect("send move");
        // Drain MoveResult + Update on the mover's side.
        for _ in 0..2 {
            next_notice(&mut active).await;
        }
    }

    // Everything must have been pushed to the idle viewer unprompted:
    // the viewer-count bump, then both move updates, in order.
    match next_notice(&mut idle).await {
        ServerNotice::Viewers { count } => assert_eq!(count, 2),
        other => panic!("expected Viewers, got {other:?}"),
    }
    for expected in [("e2", "e4"), ("e7", "e5")] {
        match next_notice(&mut idle).await {
            ServerNotice::Update(update) => assert_eq!(
                update.last_move,
                Some((expected.0.to_string(), expected.1.to_string()))
            ),
            other => panic!("expected Update, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_resign_broadcasts_terminal_update() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "").await;

    ws.send(text_frame(&ClientCommand::Resign { side: Side::White }))
        .await
        .expect("send resign");

    match next_notice(&mut ws).await {
        ServerNotice::Update(update) => {
            assert!(update.game_over);
            assert_eq!(update.status, "white resigned");
        }
        other => panic!("expected Update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_updates_viewer_count() {
    let addr = start_server().await;

    let mut ws1 = connect(&addr).await;
    let id = join(&mut ws1, "leavers").await;

    let mut ws2 = connect(&addr).await;
    join(&mut ws2, id.as_str()).await;
    match next_notice(&mut ws1).await {
        ServerNotice::Viewers { count } => assert_eq!(count, 2),
        other => panic!("expected Viewers, got {other:?}"),
    }

    ws2.send(Message::Close(None)).await.expect("close");

    match next_notice(&mut ws1).await {
        ServerNotice::Viewers { count } => assert_eq!(count, 1),
        other => panic!("expected Viewers, got {other:?}"),
    }
}
