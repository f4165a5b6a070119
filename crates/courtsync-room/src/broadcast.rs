//! Concurrent fan-out of one frame to many connections.

use courtsync_protocol::{Codec, JsonCodec, RoomId, ServerFrame};
use courtsync_transport::Connection;
use futures_util::future::join_all;

use crate::room::Target;

/// Sends `frame` to every target at once.
///
/// A failed send is logged and otherwise ignored: the connection stays in
/// the room until its own session ends or the reaper evicts it.
pub(crate) async fn fan_out<C: Connection>(
    room_id: &RoomId,
    targets: &[Target<C>],
    frame: &ServerFrame,
) {
    if targets.is_empty() {
        return;
    }

    let payload = match JsonCodec.encode(frame) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(%room_id, error = %e, "failed to encode broadcast");
            return;
        }
    };

    let sends = targets.iter().map(|(player_id, conn)| {
        let payload = &payload;
        async move {
            if let Err(e) = conn.send(payload).await {
                tracing::debug!(%room_id, %player_id, error = %e, "broadcast send failed");
            }
        }
    });
    join_all(sends).await;
}
