//! Per-connection session phases.
//!
//! Every accepted socket walks the same path:
//!
//! ```text
//! Connecting → Accepted → Authenticating ─┬→ AuthFailed ──────────────┐
//!                                         └→ Authenticated → Joining ─┤
//!                                   ┌────────────────────────┘        │
//!                                   ├→ JoinFailed ───────────────────┤
//!                                   └→ Joined → MessageLoop → Leaving ┴→ Closed
//! ```
//!
//! The gateway owns one [`SessionPhase`] per connection and calls
//! [`SessionPhase::advance`] at each step, so a handler bug that skips a
//! step (say, entering the message loop without joining) shows up as a
//! [`SessionError::InvalidTransition`] instead of silent misbehaviour.
//!
//! `Leaving` is only reachable from `MessageLoop`: a player that never
//! joined is never asked to leave.

use crate::SessionError;

/// Where a connection currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Accepted,
    Authenticating,
    AuthFailed,
    Authenticated,
    Joining,
    JoinFailed,
    Joined,
    MessageLoop,
    Leaving,
    Closed,
}

impl SessionPhase {
    /// Returns `true` if moving from `self` to `target` is a valid step.
    pub fn can_transition_to(self, target: Self) -> bool {
        use SessionPhase::*;
        matches!(
            (self, target),
            (Connecting, Accepted)
                | (Accepted, Authenticating)
                | (Authenticating, AuthFailed)
                | (Authenticating, Authenticated)
                | (AuthFailed, Closed)
                | (Authenticated, Joining)
                | (Joining, JoinFailed)
                | (Joining, Joined)
                | (JoinFailed, Closed)
                | (Joined, MessageLoop)
                | (MessageLoop, Leaving)
                | (Leaving, Closed)
        )
    }

    /// Moves to `target`, or reports the illegal edge.
    pub fn advance(&mut self, target: Self) -> Result<Self, SessionError> {
        if !self.can_transition_to(target) {
            return Err(SessionError::InvalidTransition {
                from: *self,
                to: target,
            });
        }
        *self = target;
        Ok(target)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "Connecting",
            Self::Accepted => "Accepted",
            Self::Authenticating => "Authenticating",
            Self::AuthFailed => "AuthFailed",
            Self::Authenticated => "Authenticated",
            Self::Joining => "Joining",
            Self::JoinFailed => "JoinFailed",
            Self::Joined => "Joined",
            Self::MessageLoop => "MessageLoop",
            Self::Leaving => "Leaving",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}
