//! Unified error type for the courtsync server.

use courtsync_mirror::MirrorError;
use courtsync_protocol::ProtocolError;
use courtsync_room::RoomError;
use courtsync_session::SessionError;
use courtsync_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Handlers return this so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CourtError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (missing or rejected credential).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, duplicate join).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The mirror store could not be set up.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}
