//! Player identity and connection sessions for courtsync.
//!
//! This crate covers everything between "a socket was accepted" and "a
//! player is in a room":
//!
//! 1. **Credentials**: pulling a bearer credential out of the upgrade
//!    request ([`extract_credential`]).
//! 2. **Identity**: resolving that credential to a player id through the
//!    external [`IdentityDecoder`] collaborator.
//! 3. **Phases**: the per-connection state machine ([`SessionPhase`])
//!    the gateway walks through.
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← drives SessionPhase, calls authenticate()
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, RoomId, ConnectRequest
//! ```

mod auth;
mod credential;
mod error;
mod session;

pub use auth::{IdentityDecoder, TokenTable, authenticate};
pub use credential::{extract_credential, room_from_path};
pub use error::SessionError;
pub use session::SessionPhase;
