//! Error types for the session layer.

use crate::SessionPhase;

/// Errors that can occur while establishing or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No credential was presented, neither as a header nor as a query
    /// parameter.
    #[error("authentication required")]
    AuthRequired,

    /// The credential was presented but the identity collaborator
    /// rejected it (bad signature, unknown, expired).
    #[error("authentication failed")]
    AuthInvalid,

    /// The gateway tried to move a session along an edge the state
    /// machine does not have.
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
}
