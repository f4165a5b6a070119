//! Wire protocol for courtsync.
//!
//! This crate defines what travels over a room connection:
//!
//! - **Identifiers** ([`PlayerId`], [`RoomId`], [`Role`]) shared by every
//!   layer above.
//! - **Frames** ([`ClientFrame`], [`ServerFrame`]): the JSON objects
//!   clients send and receive.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session / Room
//! ```
//!
//! Inbound frames are decoded exactly once, at the connection boundary,
//! into the closed [`ClientFrame`] enum. Anything the server does not
//! understand lands in [`ClientFrame::Unknown`] or [`ClientFrame::Dropped`]
//! so the dispatch step can match exhaustively.

mod codec;
mod error;
mod frame;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::{ClientFrame, PlayerView, RoomListEntry, ServerFrame};
pub use types::{PlayerId, Role, RoomId};

/// Close code sent when the initial credential is missing or invalid.
///
/// Non-standard (4000–4999 is the application range).
pub const CLOSE_AUTH_FAILED: u16 = 4401;

/// Close reason paired with [`CLOSE_AUTH_FAILED`].
pub const CLOSE_AUTH_FAILED_REASON: &str = "auth_failed";

/// Standard policy-violation close code, used when a credential expires
/// mid-session or the request is unusable.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Standard normal-closure code, used for server-initiated leaves.
pub const CLOSE_NORMAL: u16 = 1000;

/// Message carried by the error reply to an unrecognized frame kind.
pub const UNKNOWN_MESSAGE_TYPE: &str = "unknown message type";
