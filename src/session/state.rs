//! Session lifecycle states.

use std::fmt;

/// Lifecycle state of a [`Session`](super::Session).
///
/// ```text
/// Unopened ─► AwaitingPeer ─► Ready ◄──► Stepping
///                  │            │           │
///                  └────────────┴───────────┴──► Terminated
/// ```
///
/// A `done` flag from the peer does not leave `Ready`: ending an episode is
/// the caller's decision, made by calling `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Configured, nothing bound yet.
    Unopened,
    /// Listening and waiting for the peer to connect.
    AwaitingPeer,
    /// Connected and idle.
    Ready,
    /// An exchange is in flight.
    Stepping,
    /// Poisoned or closed; the session cannot be used again.
    Terminated,
}

impl SessionState {
    /// Returns `true` if `step`/`reset` may be called.
    #[inline]
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` once the session can no longer be used.
    #[inline]
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::AwaitingPeer => "awaiting-peer",
            Self::Ready => "ready",
            Self::Stepping => "stepping",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SessionState::AwaitingPeer.to_string(), "awaiting-peer");
        assert_eq!(SessionState::Terminated.to_string(), "terminated");
    }

    #[test]
    fn test_predicates() {
        assert!(SessionState::Ready.is_ready());
        assert!(!SessionState::Stepping.is_ready());
        assert!(SessionState::Terminated.is_terminated());
        assert!(!SessionState::Ready.is_terminated());
    }
}
