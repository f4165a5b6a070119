//! Error types for the mirror store.

/// Errors a [`MirrorStore`](crate::MirrorStore) can report.
///
/// Callers in the room layer log these and carry on; they never decide
/// the outcome of a room operation.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The Redis client reported a failure.
    #[error("mirror store error: {0}")]
    Store(#[from] fred::error::Error),

    /// The store could not be configured (bad URL).
    #[error("mirror configuration error: {0}")]
    Config(String),

    /// The store is not reachable right now.
    #[error("mirror store unavailable")]
    Unavailable,
}
