//! Transport abstraction layer for courtsync.
//!
//! Provides the [`Transport`], [`PendingConnection`] and [`Connection`]
//! traits. Rooms only ever
//! see `Connection`: they push frames into it and close it when a player
//! leaves. The gateway additionally reads from it.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod request;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use request::ConnectRequest;
#[cfg(feature = "websocket")]
pub use websocket::{PendingUpgrade, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// Accepting and upgrading are split: [`accept`](Self::accept) only takes
/// the next raw connection off the listener, and the caller drives
/// [`PendingConnection::upgrade`] wherever it likes (typically in the
/// connection's own task, under a timeout). A peer that stalls its
/// handshake therefore never holds up the accept loop.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// A connection accepted but not yet upgraded.
    type Pending: PendingConnection<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted connection whose protocol upgrade has not run yet.
pub trait PendingConnection: Send + 'static {
    /// The connection produced once the upgrade completes.
    type Connection: Connection;
    /// The error type for a failed upgrade.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Completes the upgrade.
    ///
    /// Returns the connection together with the request metadata the
    /// client presented while upgrading (path, query, headers).
    fn upgrade(
        self,
    ) -> impl Future<Output = Result<(Self::Connection, ConnectRequest), Self::Error>> + Send;
}

/// A single duplex connection.
///
/// All futures are `Send` so rooms can fan out to connections from
/// spawned tasks (the coalescer runs on its own task).
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection with the given close code and reason.
    fn close(&self, code: u16, reason: &str)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
