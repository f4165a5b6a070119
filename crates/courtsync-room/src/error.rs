//! Error types for the room layer.

use courtsync_protocol::{PlayerId, RoomId};

/// Errors a join can fail with.
///
/// Every other room operation is infallible from the caller's side:
/// touching or moving an absent player is a no-op, and mirror failures
/// are logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room already holds `capacity` players.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player already holds a slot in this room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),
}
