//! # courtsync
//!
//! Room-scoped real-time state sync for two-player web games.
//!
//! Each room holds at most two players (roles A and B). Players connect
//! over WebSocket to `/ws/{room_id}` with a bearer credential, send their
//! position and heartbeats, and receive join/leave events plus coalesced
//! `state` snapshots of everyone in the room. Room membership is mirrored
//! into a Redis-compatible store for listings across processes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courtsync::prelude::*;
//!
//! # async fn start() -> Result<(), CourtError> {
//! let server = CourtServer::builder()
//!     .bind("0.0.0.0:8000")
//!     .decoder(TokenTable::from_pairs([("dev-token", "alice")]))
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::GatewayConfig;
pub use error::CourtError;
pub use server::{CourtServer, CourtServerBuilder, Registry, ShutdownHandle};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{
        CourtError, CourtServer, CourtServerBuilder, GatewayConfig, Registry, ShutdownHandle,
    };
    pub use courtsync_mirror::{MemoryStore, MirrorStore, RedisStore};
    pub use courtsync_protocol::{PlayerId, Role, RoomId, RoomListEntry};
    pub use courtsync_room::RoomConfig;
    pub use courtsync_session::{IdentityDecoder, TokenTable};
}
