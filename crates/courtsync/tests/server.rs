//! Integration tests for the courtsync server, handler, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use courtsync::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const WAIT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: String,
    tokens: Arc<TokenTable>,
    registry: Arc<Registry<MemoryStore>>,
    shutdown: ShutdownHandle,
    task: JoinHandle<Result<(), CourtError>>,
}

/// Starts a server on a random port that accepts `t1`..`t3` as `p1`..`p3`.
async fn start_server() -> TestServer {
    let tokens = Arc::new(TokenTable::from_pairs([
        ("t1", "p1"),
        ("t2", "p2"),
        ("t3", "p3"),
    ]));
    let server = CourtServer::builder()
        .bind("127.0.0.1:0")
        .gateway_config(GatewayConfig {
            handshake_timeout: Duration::from_millis(300),
            auth_failure_pause: Duration::from_millis(20),
        })
        .decoder(Arc::clone(&tokens))
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.registry();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(server.run());

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer {
        addr,
        tokens,
        registry,
        shutdown,
        task,
    }
}

async fn connect(addr: &str, path: &str, bearer: Option<&str>) -> ClientWs {
    let mut request = format!("ws://{addr}{path}")
        .into_client_request()
        .expect("valid url");
    if let Some(token) = bearer {
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {token}").parse().expect("header value"),
        );
    }
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Reads the next frame; a close frame comes back as `Err`.
async fn next_frame(ws: &mut ClientWs) -> Result<Value, Option<CloseFrame>> {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("frame within timeout");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return Ok(serde_json::from_str(text.as_str()).expect("server sends JSON"));
            }
            Some(Ok(Message::Close(frame))) => return Err(frame),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("client error: {e}"),
            None => return Err(None),
        }
    }
}

/// Reads frames until one matches `pred`.
async fn wait_for(ws: &mut ClientWs, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        match next_frame(ws).await {
            Ok(value) if pred(&value) => return value,
            Ok(_) => continue,
            Err(frame) => panic!("closed while waiting: {frame:?}"),
        }
    }
}

/// Reads frames until the close frame and returns its code and reason.
async fn wait_for_close(ws: &mut ClientWs) -> (u16, String) {
    loop {
        match next_frame(ws).await {
            Ok(_) => continue,
            Err(Some(frame)) => return (u16::from(frame.code), frame.reason.as_str().to_owned()),
            Err(None) => panic!("stream ended without a close frame"),
        }
    }
}

fn has_type(kind: &'static str) -> impl Fn(&Value) -> bool {
    move |v: &Value| v["type"] == kind
}

/// Joins `room` as the holder of `token` and waits for its own join event.
async fn join(srv: &TestServer, room: &str, token: &str, player: &str) -> ClientWs {
    let mut ws = connect(&srv.addr, &format!("/ws/{room}"), Some(token)).await;
    wait_for(&mut ws, |v| v["type"] == "join" && v["player_id"] == player).await;
    ws
}

async fn connection_count(srv: &TestServer, room: &str) -> usize {
    match srv.registry.get(&RoomId::new(room)).await {
        Some(room) => room.connection_count().await,
        None => 0,
    }
}

/// Polls until the room holds `expected` connections.
async fn wait_for_count(srv: &TestServer, room: &str, expected: usize) {
    for _ in 0..100 {
        if connection_count(srv, room).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room {room} never reached {expected} connections");
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_silent_peer_does_not_block_other_clients() {
    let srv = start_server().await;

    // Opens TCP and never starts the WebSocket handshake.
    let _silent = tokio::net::TcpStream::connect(&srv.addr)
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let _ws = tokio::time::timeout(WAIT, join(&srv, "r1", "t1", "p1"))
        .await
        .expect("join must not wait on the silent peer");
    assert_eq!(connection_count(&srv, "r1").await, 1);
}

#[tokio::test]
async fn test_stalled_handshake_is_dropped() {
    use tokio::io::AsyncReadExt;

    let srv = start_server().await;
    let mut silent = tokio::net::TcpStream::connect(&srv.addr)
        .await
        .expect("tcp connect");

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(WAIT, silent.read(&mut buf))
        .await
        .expect("server should drop the stalled peer");
    assert!(matches!(read, Ok(0) | Err(_)));
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_missing_credential_gets_auth_frame_then_4401() {
    let srv = start_server().await;
    let mut ws = connect(&srv.addr, "/ws/r1", None).await;

    let first = next_frame(&mut ws).await.expect("auth frame before close");
    assert_eq!(first, json!({"type": "auth", "message": "false"}));

    let close = next_frame(&mut ws).await.expect_err("close right after");
    let close = close.expect("close frame carries a code");
    assert_eq!(u16::from(close.code), 4401);
    assert_eq!(close.reason.as_str(), "auth_failed");

    assert!(srv.registry.get(&RoomId::new("r1")).await.is_none());
}

#[tokio::test]
async fn test_rejected_credential_gets_auth_frame_then_4401() {
    let srv = start_server().await;
    let mut ws = connect(&srv.addr, "/ws/r1", Some("forged")).await;

    let first = next_frame(&mut ws).await.expect("auth frame");
    assert_eq!(first, json!({"type": "auth", "message": "false"}));
    assert_eq!(wait_for_close(&mut ws).await, (4401, "auth_failed".to_owned()));
}

#[tokio::test]
async fn test_query_token_authenticates() {
    let srv = start_server().await;
    let mut ws = connect(&srv.addr, "/ws/r1?token=t2", None).await;

    let joined = wait_for(&mut ws, has_type("join")).await;
    assert_eq!(joined["player_id"], "p2");
    assert_eq!(joined["player_type"], "A");
}

#[tokio::test]
async fn test_header_wins_over_query_token() {
    let srv = start_server().await;
    let mut ws = connect(&srv.addr, "/ws/r1?token=t2", Some("t1")).await;

    let joined = wait_for(&mut ws, has_type("join")).await;
    assert_eq!(joined["player_id"], "p1");
}

#[tokio::test]
async fn test_revoked_credential_on_ping_closes_with_policy_violation() {
    let srv = start_server().await;
    let mut ws = join(&srv, "r1", "t1", "p1").await;

    assert!(srv.tokens.revoke("t1").await);
    send_json(&mut ws, json!({"type": "ping"})).await;

    wait_for(&mut ws, has_type("auth")).await;
    let (code, _) = wait_for_close(&mut ws).await;
    assert_eq!(code, 1008);

    wait_for_count(&srv, "r1", 0).await;
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test]
async fn test_missing_room_id_closes_with_error() {
    let srv = start_server().await;
    let mut ws = connect(&srv.addr, "/ws/", Some("t1")).await;

    let first = next_frame(&mut ws).await.expect("error frame");
    assert_eq!(first["type"], "error");
    let (code, _) = wait_for_close(&mut ws).await;
    assert_eq!(code, 1008);
}

#[tokio::test]
async fn test_third_joiner_is_closed_without_broadcast() {
    let srv = start_server().await;
    let mut a = join(&srv, "r1", "t1", "p1").await;
    let _b = join(&srv, "r1", "t2", "p2").await;
    wait_for(&mut a, |v| v["type"] == "join" && v["player_id"] == "p2").await;

    let mut c = connect(&srv.addr, "/ws/r1", Some("t3")).await;
    match next_frame(&mut c).await {
        Err(Some(frame)) => assert_eq!(u16::from(frame.code), 1000),
        other => panic!("expected an immediate close, got {other:?}"),
    }

    let players: Vec<String> = srv
        .registry
        .players(&RoomId::new("r1"))
        .await
        .into_iter()
        .map(|p| p.player_id.to_string())
        .collect();
    assert_eq!(players, ["p1", "p2"]);
}

#[tokio::test]
async fn test_second_joiner_is_b() {
    let srv = start_server().await;
    let _a = join(&srv, "r1", "t1", "p1").await;
    let mut b = connect(&srv.addr, "/ws/r1", Some("t2")).await;

    let joined = wait_for(&mut b, |v| v["type"] == "join" && v["player_id"] == "p2").await;
    assert_eq!(joined["player_type"], "B");
}

// =========================================================================
// Message loop
// =========================================================================

#[tokio::test]
async fn test_move_reaches_both_players_in_state() {
    let srv = start_server().await;
    let mut a = join(&srv, "r1", "t1", "p1").await;
    let mut b = join(&srv, "r1", "t2", "p2").await;

    send_json(&mut a, json!({"type": "move", "x": 10, "y": 20})).await;

    let moved = |v: &Value| {
        v["type"] == "state"
            && v["players"].as_array().is_some_and(|players| {
                players
                    .iter()
                    .any(|p| p["player_id"] == "p1" && p["x"] == 10.0 && p["y"] == 20.0)
            })
    };
    wait_for(&mut a, moved).await;
    wait_for(&mut b, moved).await;
}

#[tokio::test]
async fn test_ping_gets_pong() {
    let srv = start_server().await;
    let mut ws = join(&srv, "r1", "t1", "p1").await;

    send_json(&mut ws, json!({"type": "ping"})).await;
    wait_for(&mut ws, has_type("pong")).await;
}

#[tokio::test]
async fn test_unknown_type_gets_error_reply() {
    let srv = start_server().await;
    let mut ws = join(&srv, "r1", "t1", "p1").await;

    send_json(&mut ws, json!({"type": "dance"})).await;
    let reply = wait_for(&mut ws, has_type("error")).await;
    assert_eq!(reply["message"], "unknown message type");
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let srv = start_server().await;
    let mut ws = join(&srv, "r1", "t1", "p1").await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    send_json(&mut ws, json!({"type": "ping"})).await;

    wait_for(&mut ws, has_type("pong")).await;
    assert_eq!(connection_count(&srv, "r1").await, 1);
}

#[tokio::test]
async fn test_ball_frame_is_relayed() {
    let srv = start_server().await;
    let mut a = join(&srv, "r1", "t1", "p1").await;
    let mut b = join(&srv, "r1", "t2", "p2").await;

    send_json(
        &mut a,
        json!({"type": "ball", "x": 5, "y": 6, "vx": 1.5, "vy": -2}),
    )
    .await;

    let ball = wait_for(&mut b, has_type("ball")).await;
    assert_eq!(ball["x"], 5.0);
    assert_eq!(ball["vx"], 1.5);
    wait_for(&mut a, has_type("ball")).await;
}

#[tokio::test]
async fn test_start_frame_broadcasts_game_started() {
    let srv = start_server().await;
    let mut a = join(&srv, "r1", "t1", "p1").await;
    let mut b = join(&srv, "r1", "t2", "p2").await;

    send_json(&mut b, json!({"type": "START"})).await;

    wait_for(&mut a, has_type("game_started")).await;
    wait_for(&mut b, has_type("game_started")).await;
    assert!(
        srv.registry
            .get(&RoomId::new("r1"))
            .await
            .expect("room exists")
            .is_started()
            .await
    );
}

#[tokio::test]
async fn test_world_frame_sets_bounds() {
    let srv = start_server().await;
    let mut ws = join(&srv, "r1", "t1", "p1").await;

    send_json(&mut ws, json!({"type": "world", "width": 800, "height": 600})).await;
    send_json(&mut ws, json!({"type": "ping"})).await;
    wait_for(&mut ws, has_type("pong")).await;

    let world = srv
        .registry
        .get(&RoomId::new("r1"))
        .await
        .expect("room exists")
        .world()
        .await
        .expect("world set");
    assert_eq!((world.width, world.height), (800.0, 600.0));
}

#[tokio::test]
async fn test_disconnect_broadcasts_leave() {
    let srv = start_server().await;
    let mut a = join(&srv, "r1", "t1", "p1").await;
    let mut b = join(&srv, "r1", "t2", "p2").await;

    b.close(None).await.expect("client close");

    let left = wait_for(&mut a, has_type("leave")).await;
    assert_eq!(left["player_id"], "p2");
    wait_for_count(&srv, "r1", 1).await;
}

#[tokio::test]
async fn test_rejoin_after_disconnect_reclaims_a() {
    let srv = start_server().await;
    let mut a = join(&srv, "r1", "t1", "p1").await;
    let _b = join(&srv, "r1", "t2", "p2").await;

    a.close(None).await.expect("client close");
    wait_for_count(&srv, "r1", 1).await;

    let mut c = connect(&srv.addr, "/ws/r1", Some("t3")).await;
    let joined = wait_for(&mut c, |v| v["type"] == "join" && v["player_id"] == "p3").await;
    assert_eq!(joined["player_type"], "A");
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_players_and_stops_server() {
    let srv = start_server().await;
    let mut ws = join(&srv, "r1", "t1", "p1").await;

    srv.shutdown.shutdown();

    let (code, _) = wait_for_close(&mut ws).await;
    assert_eq!(code, 1000);

    let result = tokio::time::timeout(WAIT, srv.task)
        .await
        .expect("server stops in time")
        .expect("server task does not panic");
    assert!(result.is_ok());
    assert!(srv.registry.get(&RoomId::new("r1")).await.is_none());
}

#[tokio::test]
async fn test_list_rooms_reflects_live_sessions() {
    let srv = start_server().await;
    let _a = join(&srv, "r1", "t1", "p1").await;
    let _b = join(&srv, "r1", "t2", "p2").await;

    let rooms = srv.registry.list_rooms().await;
    let r1 = rooms
        .iter()
        .find(|entry| entry.room_id == RoomId::new("r1"))
        .expect("r1 listed");
    assert_eq!(r1.player_count, 2);
    assert_eq!(r1.capacity, 2);
}
