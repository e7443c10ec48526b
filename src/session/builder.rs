//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and opening [`Session`] instances.
//!
//! # Example
//!
//! ```ignore
//! use lockstep_bridge::{ActionEncoding, Session};
//!
//! let mut session = Session::builder()
//!     .program("./target/release/bullettest")
//!     .arg("--seed")
//!     .arg("7")
//!     .encoding(ActionEncoding::Bitmask)
//!     .launch()
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::ActionEncoding;

use super::config::{PeerCommand, SessionConfig};
use super::core::{PendingSession, Session};

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SessionBuilder {
    /// Peer executable.
    program: Option<PathBuf>,
    /// Peer arguments placed before the port.
    args: Vec<String>,
    /// Peer working directory.
    current_dir: Option<PathBuf>,
    /// Forward peer output.
    inherit_stdio: bool,
    /// Peer is started by someone else.
    external: bool,
    /// Everything not about the peer command.
    config: SessionConfig,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new builder with default settings and no peer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from JSON.
    #[must_use]
    pub fn from_config(mut config: SessionConfig) -> Self {
        let mut builder = Self::new();
        match config.peer.take() {
            Some(peer) => {
                builder.program = Some(peer.program);
                builder.args = peer.args;
                builder.current_dir = peer.current_dir;
                builder.inherit_stdio = peer.inherit_stdio;
            }
            None => builder.external = true,
        }
        builder.config = config;
        builder
    }

    /// Sets the peer executable.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the peer, or a bare name looked up on `PATH`
    #[inline]
    #[must_use]
    pub fn program(mut self, path: impl Into<PathBuf>) -> Self {
        self.program = Some(path.into());
        self.external = false;
        self
    }

    /// Adds one peer argument (placed before the port).
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds several peer arguments.
    #[inline]
    #[must_use]
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the peer working directory.
    #[inline]
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Forwards the peer's stdout/stderr.
    #[inline]
    #[must_use]
    pub fn inherit_stdio(mut self) -> Self {
        self.inherit_stdio = true;
        self
    }

    /// Uses a full peer command.
    #[must_use]
    pub fn peer(mut self, peer: PeerCommand) -> Self {
        self.program = Some(peer.program);
        self.args = peer.args;
        self.current_dir = peer.current_dir;
        self.inherit_stdio = peer.inherit_stdio;
        self.external = false;
        self
    }

    /// Only listens; the peer is started outside this process.
    #[inline]
    #[must_use]
    pub fn external(mut self) -> Self {
        self.external = true;
        self.program = None;
        self
    }

    /// Sets the listening address.
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.config.bind_ip = ip;
        self
    }

    /// Sets a fixed listening port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the action encoding.
    #[inline]
    #[must_use]
    pub fn encoding(mut self, encoding: ActionEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Sets how long to wait for the peer to connect.
    #[inline]
    #[must_use]
    pub fn accept_timeout(mut self, timeout: Duration) -> Self {
        self.config.accept_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Bounds each exchange.
    #[inline]
    #[must_use]
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout_ms = Some(ceil_millis(timeout));
        self
    }

    /// Sets how long `close` waits before killing the peer.
    #[inline]
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace_ms = ceil_millis(grace);
        self
    }

    /// Accepts any done byte, treating values other than 1 as `false`.
    #[inline]
    #[must_use]
    pub fn lenient_done(mut self) -> Self {
        self.config.strict_done = false;
        self
    }

    /// Produces the validated configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no program was set and `external()` was not called
    /// - [`Error::PeerNotFound`] if an explicit program path does not exist
    /// - [`Error::Config`] on invalid timeouts
    pub fn build(self) -> Result<SessionConfig> {
        let peer = self.validate_peer()?;
        let config = SessionConfig { peer, ..self.config };
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration and starts listening.
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::build`] and [`Session::listen`].
    pub async fn listen(self) -> Result<PendingSession> {
        Session::listen(self.build()?).await
    }

    /// Builds the configuration, launches the peer and waits for it.
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::build`] and [`Session::launch`].
    pub async fn launch(self) -> Result<Session> {
        Session::launch(self.build()?).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Validates the peer command configuration.
    fn validate_peer(&self) -> Result<Option<PeerCommand>> {
        if self.external {
            return Ok(None);
        }

        let program = self.program.clone().ok_or_else(|| {
            Error::config(
                "Peer program is required. Use .program() to set it, or .external() \
                 if the peer is started separately.\n\
                 Example: Session::builder().program(\"./target/release/bullettest\")",
            )
        })?;

        let peer = PeerCommand {
            program,
            args: self.args.clone(),
            current_dir: self.current_dir.clone(),
            inherit_stdio: self.inherit_stdio,
        };

        Ok(Some(peer))
    }
}

/// Converts to whole milliseconds, rounding any remainder up so a non-zero
/// duration never becomes zero.
fn ceil_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
