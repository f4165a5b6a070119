//! Error types for the protocol layer.
//!
//! Each courtsync crate defines its own error enum. A `ProtocolError`
//! always means serialization went wrong, never networking or room state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (Rust value to bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (bytes to Rust value).
    ///
    /// Common causes: malformed JSON, a JSON value that is not an object,
    /// or truncated frames.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
