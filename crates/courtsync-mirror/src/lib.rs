//! Cross-process mirror of courtsync room state.
//!
//! Each server process keeps the authoritative room state in memory. The
//! mirror copies membership, player fields, ball fields and room metadata
//! into a shared key/value store so other processes (and the room listing)
//! can see them. It is a secondary index only: nothing in the room layer
//! waits on it for correctness, and every failure is absorbed there.
//!
//! The store is reached through the [`MirrorStore`] trait, which exposes
//! just the two Redis shapes the mirror needs (sets and field maps).
//! Two backends ship:
//!
//! - [`RedisStore`] talks to Redis (or anything speaking its protocol)
//!   through `fred`.
//! - [`MemoryStore`] keeps everything in-process. It backs single-process
//!   deployments and tests, and can be taken offline to simulate an outage.
//!
//! Key names live in [`keys`].

mod error;
pub mod keys;
mod memory;
mod redis;

use std::collections::HashMap;
use std::future::Future;

pub use error::MirrorError;
pub use memory::MemoryStore;
pub use redis::RedisStore;

/// A field map (Redis hash) as stored in the mirror.
pub type Fields = HashMap<String, String>;

/// The operations the mirror performs against its store.
///
/// Implementations must be cheap to share (`Arc`) and safe to call from
/// many tasks at once. Missing keys read as empty, the way Redis does.
pub trait MirrorStore: Send + Sync + 'static {
    /// Adds `member` to the set at `key`.
    fn set_add(&self, key: &str, member: &str)
    -> impl Future<Output = Result<(), MirrorError>> + Send;

    /// Removes `member` from the set at `key`.
    fn set_remove(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<(), MirrorError>> + Send;

    /// Lists the members of the set at `key`.
    fn set_members(&self, key: &str)
    -> impl Future<Output = Result<Vec<String>, MirrorError>> + Send;

    /// Writes `fields` into the hash at `key`, keeping other fields.
    fn hash_set(&self, key: &str, fields: Fields)
    -> impl Future<Output = Result<(), MirrorError>> + Send;

    /// Reads every field of the hash at `key`.
    fn hash_get_all(&self, key: &str)
    -> impl Future<Output = Result<Fields, MirrorError>> + Send;

    /// Deletes `key` whatever its type.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), MirrorError>> + Send;
}
