//! Room state and the room protocol for courtsync.
//!
//! A room holds up to two players (roles A and B), their positions, a
//! shared ball and the court bounds. This crate owns all of it in memory
//! and keeps a best-effort copy in the mirror store for other processes.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/looks up rooms and runs every room
//!   operation (join, leave, touch, move, ball, world, start)
//! - [`Room`]: one room's lock-guarded state
//! - [`RoomConfig`]: capacity and timing
//! - [`Ball`] / [`World`]: ball sample with velocity decay, court bounds
//! - [`spawn_reaper`]: the idle-player eviction task
//!
//! # Broadcast policy
//!
//! `join`, `leave`, `ball` and `game_started` frames go out immediately.
//! Position changes only mark the room dirty; a per-room coalescer task
//! sends one `state` snapshot per interval when something changed.

mod broadcast;
pub mod clock;
mod coalescer;
mod config;
mod error;
mod mirror;
pub mod physics;
mod reaper;
mod registry;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use mirror::Mirror;
pub use physics::{Ball, World};
pub use reaper::{ReaperHandle, spawn_reaper};
pub use registry::{JoinOutcome, ReapReport, RoomRegistry};
pub use room::Room;
