//! Identity hook for resolving credentials to players.
//!
//! courtsync doesn't issue or verify credentials itself. Login, password
//! hashing, and token signing belong to an external collaborator; the
//! server only needs one question answered: "whose credential is this,
//! and is it still good?" That question is the [`IdentityDecoder`] trait.
//!
//! The gateway asks it twice per session: once at connect time and again
//! on every `ping`, so an expired credential ends the session at the next
//! heartbeat.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use courtsync_protocol::PlayerId;
use tokio::sync::RwLock;

use crate::SessionError;

/// Resolves an opaque bearer credential to a player identity.
///
/// Returns `None` on any failure (malformed, bad signature, expired,
/// unknown). The returned id is used verbatim as the room player id.
///
/// # Example
///
/// ```rust
/// use courtsync_protocol::PlayerId;
/// use courtsync_session::IdentityDecoder;
///
/// /// Treats any numeric credential as the user id. Development only.
/// struct NumericIds;
///
/// impl IdentityDecoder for NumericIds {
///     async fn decode(&self, credential: &str) -> Option<PlayerId> {
///         credential.parse::<u64>().ok().map(|id| PlayerId::new(id.to_string()))
///     }
/// }
/// ```
pub trait IdentityDecoder: Send + Sync + 'static {
    /// Decodes and validates `credential`.
    fn decode(&self, credential: &str) -> impl Future<Output = Option<PlayerId>> + Send;
}

/// Runs the connect-time authentication step.
///
/// # Errors
/// - [`SessionError::AuthRequired`] when no credential was presented
/// - [`SessionError::AuthInvalid`] when the decoder rejects it
pub async fn authenticate(
    decoder: &impl IdentityDecoder,
    credential: Option<&str>,
) -> Result<PlayerId, SessionError> {
    let credential = credential.ok_or(SessionError::AuthRequired)?;
    decoder
        .decode(credential)
        .await
        .ok_or(SessionError::AuthInvalid)
}

/// A fixed table of accepted credentials.
///
/// Useful for local development and tests. Credentials can be revoked
/// while sessions are live, which makes the next `ping` from that session
/// fail re-validation exactly like an expired token would.
#[derive(Debug, Default)]
pub struct TokenTable {
    tokens: RwLock<HashMap<String, PlayerId>>,
}

impl TokenTable {
    /// Creates an empty table. Every credential is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(credential, player)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tokens = pairs
            .into_iter()
            .map(|(token, player)| (token.into(), PlayerId::new(player)))
            .collect();
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    /// Accepts `credential` as `player` from now on.
    pub async fn insert(&self, credential: impl Into<String>, player: PlayerId) {
        self.tokens.write().await.insert(credential.into(), player);
    }

    /// Stops accepting `credential`. Returns whether it was present.
    pub async fn revoke(&self, credential: &str) -> bool {
        let removed = self.tokens.write().await.remove(credential);
        if let Some(player_id) = &removed {
            tracing::info!(%player_id, "credential revoked");
        }
        removed.is_some()
    }
}

impl IdentityDecoder for TokenTable {
    async fn decode(&self, credential: &str) -> Option<PlayerId> {
        self.tokens.read().await.get(credential).cloned()
    }
}

/// Lets a decoder be shared with whoever rotates its credentials.
impl<T: IdentityDecoder> IdentityDecoder for Arc<T> {
    fn decode(&self, credential: &str) -> impl Future<Output = Option<PlayerId>> + Send {
        (**self).decode(credential)
    }
}
