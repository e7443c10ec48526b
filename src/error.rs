//! Error types for the lockstep bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use lockstep_bridge::{Action, Result, Session};
//!
//! async fn example(session: &mut Session) -> Result<()> {
//!     let result = session.step(Action::Index(5)).await?;
//!     println!("reward = {}", result.reward);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::PeerNotFound`], [`Error::InvalidArgument`] |
//! | Launch | [`Error::ProcessLaunchFailed`], [`Error::PeerExited`], [`Error::Bind`], [`Error::PeerLaunchTimeout`] |
//! | Transport | [`Error::ConnectionClosed`], [`Error::Desync`], [`Error::Protocol`], [`Error::StepTimeout`] |
//! | Session | [`Error::SessionTerminated`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Image`] |
//!
//! # Fatality
//!
//! Transport errors poison the session that raised them: the byte stream
//! position can no longer be trusted, so the session must be dropped and
//! launched again (which respawns the peer). See [`Error::is_fatal`].

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::result::Result as StdResult;

use image::ImageError;
use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Peer executable not found at path.
    #[error("Peer executable not found at: {path}")]
    PeerNotFound {
        /// Path where the executable was expected.
        path: PathBuf,
    },

    /// Invalid argument passed to a session operation.
    ///
    /// Nothing has been written to the stream when this is returned, so the
    /// session stays usable.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Launch Errors
    // ========================================================================
    /// Failed to launch the peer process.
    #[error("Failed to launch peer: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    /// The peer process exited before connecting back.
    #[error("Peer exited before connecting: {status}")]
    PeerExited {
        /// Exit status as reported by the OS.
        status: String,
    },

    /// Binding the listening endpoint failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: IoError,
    },

    /// The peer did not connect within the accept timeout.
    #[error("Peer did not connect within {timeout_ms}ms")]
    PeerLaunchTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The peer closed the stream before a message was complete.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The response sentinel did not match; the stream is misaligned.
    #[error("Stream desync: expected sentinel 0x1337BEEF, found {found:#010X}")]
    Desync {
        /// The 32-bit value read where the sentinel was expected.
        found: u32,
    },

    /// Protocol violation other than a sentinel mismatch.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A step did not complete within the configured step timeout.
    #[error("Step timed out after {timeout_ms}ms")]
    StepTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session was poisoned by an earlier failure or a cancelled step.
    #[error("Session terminated: {reason}")]
    SessionTerminated {
        /// Why the session can no longer be used.
        reason: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding error.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a peer not found error.
    #[inline]
    pub fn peer_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PeerNotFound { path: path.into() }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a peer exited error.
    #[inline]
    pub fn peer_exited(status: impl ToString) -> Self {
        Self::PeerExited {
            status: status.to_string(),
        }
    }

    /// Creates a bind error.
    #[inline]
    pub fn bind(addr: SocketAddr, source: IoError) -> Self {
        Self::Bind { addr, source }
    }

    /// Creates a peer launch timeout error.
    #[inline]
    pub fn peer_launch_timeout(timeout_ms: u64) -> Self {
        Self::PeerLaunchTimeout { timeout_ms }
    }

    /// Creates a desync error from the value found in place of the sentinel.
    #[inline]
    pub fn desync(found: u32) -> Self {
        Self::Desync { found }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a step timeout error.
    #[inline]
    pub fn step_timeout(timeout_ms: u64) -> Self {
        Self::StepTimeout { timeout_ms }
    }

    /// Creates a session terminated error.
    #[inline]
    pub fn session_terminated(reason: impl Into<String>) -> Self {
        Self::SessionTerminated {
            reason: reason.into(),
        }
    }

    /// Maps a stream I/O error, folding peer disconnects into
    /// [`Error::ConnectionClosed`].
    pub(crate) fn from_stream_io(err: IoError) -> Self {
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::WriteZero => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::PeerLaunchTimeout { .. } | Self::StepTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Bind { .. } | Self::PeerLaunchTimeout { .. } | Self::ConnectionClosed
        )
    }

    /// Returns `true` if the session that raised this error must be rebuilt.
    ///
    /// Fatal errors leave the byte stream in an unknown position. No fatal
    /// error is retryable in place.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::Desync { .. }
                | Self::Protocol { .. }
                | Self::StepTimeout { .. }
                | Self::SessionTerminated { .. }
                | Self::PeerExited { .. }
                | Self::Io(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::protocol("bad done byte");
        assert_eq!(err.to_string(), "Protocol error: bad done byte");
    }

    #[test]
    fn test_desync_display_shows_found_value() {
        let err = Error::desync(0xDEADBEEF);
        assert_eq!(
            err.to_string(),
            "Stream desync: expected sentinel 0x1337BEEF, found 0xDEADBEEF"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::peer_launch_timeout(5000).is_timeout());
        assert!(Error::step_timeout(100).is_timeout());
        assert!(!Error::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::desync(0).is_fatal());
        assert!(Error::step_timeout(10).is_fatal());
        assert!(Error::session_terminated("cancelled").is_fatal());

        assert!(!Error::invalid_argument("index 40").is_fatal());
        assert!(!Error::config("missing program").is_fatal());
        assert!(!Error::peer_launch_timeout(1000).is_fatal());
    }

    #[test]
    fn test_stream_io_disconnects_map_to_connection_closed() {
        for kind in [
            ErrorKind::UnexpectedEof,
            ErrorKind::ConnectionReset,
            ErrorKind::BrokenPipe,
        ] {
            let err = Error::from_stream_io(IoError::new(kind, "gone"));
            assert!(matches!(err, Error::ConnectionClosed), "{kind:?}");
        }

        let other = Error::from_stream_io(IoError::new(ErrorKind::PermissionDenied, "no"));
        assert!(matches!(other, Error::Io(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
