//! Per-connection handler: auth, join, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow follows [`SessionPhase`]:
//!   0. Finish the WebSocket handshake, bounded by `handshake_timeout`
//!   1. Authenticate the credential from the upgrade request
//!   2. Join the room named by the request path
//!   3. Loop: receive frames → dispatch to the room registry
//!   4. Leave the room, exactly once, however the loop ended

use std::sync::Arc;

use courtsync_mirror::MirrorStore;
use courtsync_protocol::{
    CLOSE_AUTH_FAILED, CLOSE_AUTH_FAILED_REASON, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION,
    ClientFrame, Codec, PlayerId, RoomId, ServerFrame, UNKNOWN_MESSAGE_TYPE,
};
use courtsync_session::{
    IdentityDecoder, SessionPhase, authenticate, extract_credential, room_from_path,
};
use courtsync_transport::{Connection, PendingConnection, PendingUpgrade, TransportError};

use crate::CourtError;
use crate::server::{Registry, ServerState};

/// Drop guard that removes the player from its room when the handler
/// exits.
///
/// The normal path calls [`leave`](Self::leave) and awaits it. If the
/// handler unwinds or its task is dropped first, `Drop` spawns the leave
/// instead. Either way it runs once.
struct LeaveGuard<S: MirrorStore> {
    registry: Arc<Registry<S>>,
    member: Option<(RoomId, PlayerId)>,
}

impl<S: MirrorStore> LeaveGuard<S> {
    fn new(registry: Arc<Registry<S>>, room_id: RoomId, player_id: PlayerId) -> Self {
        Self {
            registry,
            member: Some((room_id, player_id)),
        }
    }

    async fn leave(mut self) {
        if let Some((room_id, player_id)) = self.member.take() {
            self.registry.leave(&room_id, &player_id).await;
        }
    }
}

impl<S: MirrorStore> Drop for LeaveGuard<S> {
    fn drop(&mut self) {
        if let Some((room_id, player_id)) = self.member.take() {
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                registry.leave(&room_id, &player_id).await;
            });
        }
    }
}

/// What the message loop does after a frame.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    End,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, D>(
    pending: PendingUpgrade,
    state: Arc<ServerState<S, D>>,
) -> Result<(), CourtError>
where
    S: MirrorStore,
    D: IdentityDecoder,
{
    let mut phase = SessionPhase::Connecting;
    let peer = pending.peer_addr();
    let (conn, request) =
        match tokio::time::timeout(state.config.handshake_timeout, pending.upgrade()).await {
            Ok(upgraded) => upgraded?,
            Err(_) => {
                tracing::debug!(%peer, "handshake timed out");
                return Ok(());
            }
        };
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    phase.advance(SessionPhase::Accepted)?;
    tracing::debug!(%conn_id, path = %request.path, "handling new connection");

    // --- Step 1: Authenticate ---
    phase.advance(SessionPhase::Authenticating)?;
    let credential = extract_credential(&request);
    let player_id = match authenticate(&state.decoder, credential.as_deref()).await {
        Ok(player_id) => player_id,
        Err(e) => {
            phase.advance(SessionPhase::AuthFailed)?;
            tracing::info!(%conn_id, reason = %e, "authentication failed");
            reject_credential(&*conn, &state, CLOSE_AUTH_FAILED, CLOSE_AUTH_FAILED_REASON).await;
            phase.advance(SessionPhase::Closed)?;
            return Err(e.into());
        }
    };
    phase.advance(SessionPhase::Authenticated)?;
    tracing::debug!(%conn_id, %player_id, "player authenticated");

    // --- Step 2: Join ---
    phase.advance(SessionPhase::Joining)?;
    let Some(room_id) = room_from_path(&request.path) else {
        phase.advance(SessionPhase::JoinFailed)?;
        tracing::info!(%conn_id, %player_id, path = %request.path, "no room id in path");
        send_best_effort(&*conn, &state.codec, &ServerFrame::error("room id required")).await;
        close_best_effort(&*conn, CLOSE_POLICY_VIOLATION, "room id required").await;
        phase.advance(SessionPhase::Closed)?;
        return Ok(());
    };

    if let Err(e) = state
        .registry
        .join(&room_id, &player_id, Arc::clone(&conn))
        .await
    {
        phase.advance(SessionPhase::JoinFailed)?;
        tracing::info!(%room_id, %player_id, error = %e, "join rejected");
        close_best_effort(&*conn, CLOSE_NORMAL, "").await;
        phase.advance(SessionPhase::Closed)?;
        return Err(e.into());
    }
    let guard = LeaveGuard::new(
        Arc::clone(&state.registry),
        room_id.clone(),
        player_id.clone(),
    );
    phase.advance(SessionPhase::Joined)?;

    // --- Step 3: Message loop ---
    phase.advance(SessionPhase::MessageLoop)?;
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%room_id, %player_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%room_id, %player_id, error = %e, "recv error");
                break;
            }
        };

        let frame = match ClientFrame::decode(&state.codec, &data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%room_id, %player_id, error = %e, "ignoring malformed frame");
                continue;
            }
        };

        let flow =
            dispatch(&*conn, &state, credential.as_deref(), &room_id, &player_id, frame).await;
        if flow == Flow::End {
            break;
        }
    }

    // --- Step 4: Leave ---
    phase.advance(SessionPhase::Leaving)?;
    guard.leave().await;
    phase.advance(SessionPhase::Closed)?;
    Ok(())
}

/// Routes one inbound frame.
///
/// Replies are best-effort: a failed `pong` or error frame is logged and
/// the loop keeps reading until `recv` reports the close.
async fn dispatch<C, S, D>(
    conn: &C,
    state: &ServerState<S, D>,
    credential: Option<&str>,
    room_id: &RoomId,
    player_id: &PlayerId,
    frame: ClientFrame,
) -> Flow
where
    C: Connection<Error = TransportError>,
    S: MirrorStore,
    D: IdentityDecoder,
{
    let registry = &state.registry;
    match frame {
        ClientFrame::Move { x, y } => {
            registry.update_position(room_id, player_id, x, y).await;
        }

        ClientFrame::Ping => {
            if let Err(e) = authenticate(&state.decoder, credential).await {
                tracing::info!(%room_id, %player_id, reason = %e, "credential no longer valid");
                reject_credential(conn, state, CLOSE_POLICY_VIOLATION, "").await;
                return Flow::End;
            }
            send_best_effort(conn, &state.codec, &ServerFrame::Pong).await;
            registry.touch(room_id, player_id).await;
        }

        ClientFrame::Ball { x, y, vx, vy } => {
            registry.record_ball(room_id, x, y, vx, vy).await;
        }

        ClientFrame::World { width, height } => {
            if !registry.set_world(room_id, width, height).await {
                tracing::debug!(%room_id, %player_id, "world already set");
            }
        }

        ClientFrame::Start => {
            if !registry.start_game(room_id).await {
                tracing::debug!(%room_id, %player_id, "game already started");
            }
        }

        ClientFrame::Dropped { kind } => {
            tracing::debug!(%room_id, %player_id, kind, "dropping frame with unusable fields");
        }

        ClientFrame::Unknown(kind) => {
            tracing::debug!(%room_id, %player_id, %kind, "unknown message type");
            send_best_effort(conn, &state.codec, &ServerFrame::error(UNKNOWN_MESSAGE_TYPE)).await;
        }
    }
    Flow::Continue
}

/// Sends the auth-failure frame, gives the client a moment to read it,
/// then closes with `code`.
async fn reject_credential<C, S, D>(
    conn: &C,
    state: &ServerState<S, D>,
    code: u16,
    reason: &str,
) where
    C: Connection<Error = TransportError>,
    S: MirrorStore,
    D: IdentityDecoder,
{
    send_best_effort(conn, &state.codec, &ServerFrame::auth_failed()).await;
    tokio::time::sleep(state.config.auth_failure_pause).await;
    close_best_effort(conn, code, reason).await;
}

async fn send_frame<C: Connection<Error = TransportError>>(
    conn: &C,
    codec: &impl Codec,
    frame: &ServerFrame,
) -> Result<(), CourtError> {
    let bytes = codec.encode(frame)?;
    conn.send(&bytes).await?;
    Ok(())
}

async fn send_best_effort<C>(conn: &C, codec: &impl Codec, frame: &ServerFrame)
where
    C: Connection<Error = TransportError>,
{
    if let Err(e) = send_frame(conn, codec, frame).await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
    }
}

async fn close_best_effort(conn: &impl Connection, code: u16, reason: &str) {
    if let Err(e) = conn.close(code, reason).await {
        tracing::debug!(conn_id = %conn.id(), code, error = %e, "close failed");
    }
}
