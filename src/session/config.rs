//! Session and peer launch configuration.
//!
//! Each kind of peer is a [`PeerCommand`] value rather than a separate type:
//! the command names the executable, its leading arguments and working
//! directory, and the session appends the listening port when it launches.
//!
//! # Example
//!
//! ```ignore
//! use lockstep_bridge::session::{PeerCommand, SessionConfig};
//!
//! let config = SessionConfig::new()
//!     .with_peer(PeerCommand::native("./target/release/bullettest"))
//!     .with_accept_timeout_ms(10_000);
//!
//! config.validate()?;
//! ```
//!
//! Configurations also load from JSON; every field except `peer.program`
//! has a default:
//!
//! ```json
//! {
//!   "peer": { "program": "./bullettest", "args": ["--seed", "7"] },
//!   "encoding": "bitmask",
//!   "step_timeout_ms": 5000
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::ActionEncoding;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for the peer to connect back (milliseconds).
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 30_000;

/// Default time to wait for the peer to exit on close (milliseconds).
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;

// ============================================================================
// PeerCommand
// ============================================================================

/// How to launch a peer process.
///
/// The listening port is always appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCommand {
    /// Executable to run.
    pub program: PathBuf,

    /// Arguments placed before the port.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<PathBuf>,

    /// Let the peer write to this process's stdout/stderr.
    #[serde(default)]
    pub inherit_stdio: bool,
}

impl PeerCommand {
    /// Creates a command for `program` with no extra arguments.
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            inherit_stdio: false,
        }
    }

    /// A peer executable that speaks the protocol itself.
    #[inline]
    #[must_use]
    pub fn native(path: impl Into<PathBuf>) -> Self {
        Self::new(path)
    }

    /// An injector that loads `payload` into the `target` game binary.
    ///
    /// Launched as `injector payload target <port>`.
    #[must_use]
    pub fn injected(
        injector: impl Into<PathBuf>,
        payload: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(injector).with_args([payload.into(), target.into()])
    }

    /// Adds one argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds several arguments.
    #[inline]
    #[must_use]
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[inline]
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Forwards the peer's stdout/stderr to this process.
    #[inline]
    #[must_use]
    pub fn with_inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    /// Builds the full argument list for a launch on `port`.
    #[must_use]
    pub fn to_args(&self, port: u16) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(port.to_string());
        args
    }

    /// Checks that the program is set and, if it names a path, exists.
    ///
    /// Bare names such as `bullettest` are left to `PATH` lookup at launch.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the program is empty
    /// - [`Error::PeerNotFound`] if an explicit path does not exist
    pub fn validate(&self) -> Result<()> {
        if self.program.as_os_str().is_empty() {
            return Err(Error::config(
                "Peer program is required.\n\
                 Example: PeerCommand::native(\"./target/release/bullettest\")",
            ));
        }

        let program = match &self.current_dir {
            Some(dir) if self.program.is_relative() => dir.join(&self.program),
            _ => self.program.clone(),
        };

        if has_directory(&self.program) && !program.exists() {
            return Err(Error::peer_not_found(program));
        }

        if let Some(dir) = &self.current_dir
            && !dir.is_dir()
        {
            return Err(Error::config(format!(
                "Peer working directory not found: {}",
                dir.display()
            )));
        }

        Ok(())
    }
}

/// Returns `true` if `path` has directory components.
fn has_directory(path: &Path) -> bool {
    path.parent().is_some_and(|p| !p.as_os_str().is_empty())
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Everything needed to open one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Peer to launch. `None` waits for an externally started peer.
    pub peer: Option<PeerCommand>,

    /// Address to listen on.
    pub bind_ip: IpAddr,

    /// Port to listen on; 0 picks an ephemeral port.
    pub port: u16,

    /// Action encoding used for the whole session.
    pub encoding: ActionEncoding,

    /// How long to wait for the peer to connect (milliseconds).
    pub accept_timeout_ms: u64,

    /// Upper bound on one exchange (milliseconds). `None` waits forever.
    pub step_timeout_ms: Option<u64>,

    /// How long `close` waits for the peer to exit before killing it.
    pub shutdown_grace_ms: u64,

    /// Reject done bytes other than 0 and 1.
    pub strict_done: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            peer: None,
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            encoding: ActionEncoding::default(),
            accept_timeout_ms: DEFAULT_ACCEPT_TIMEOUT_MS,
            step_timeout_ms: None,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            strict_done: true,
        }
    }
}

// ============================================================================
// SessionConfig - Constructors
// ============================================================================

impl SessionConfig {
    /// Creates a configuration with defaults and no peer command.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration launching `peer`.
    #[inline]
    #[must_use]
    pub fn for_peer(peer: PeerCommand) -> Self {
        Self::default().with_peer(peer)
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a valid configuration
    /// - any error from [`SessionConfig::validate`]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - see [`SessionConfig::from_json_str`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }
}

// ============================================================================
// SessionConfig - Builder Methods
// ============================================================================

impl SessionConfig {
    /// Sets the peer command.
    #[inline]
    #[must_use]
    pub fn with_peer(mut self, peer: PeerCommand) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Sets the listening address.
    #[inline]
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Sets a fixed listening port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the action encoding.
    #[inline]
    #[must_use]
    pub fn with_encoding(mut self, encoding: ActionEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the accept timeout.
    #[inline]
    #[must_use]
    pub fn with_accept_timeout_ms(mut self, ms: u64) -> Self {
        self.accept_timeout_ms = ms;
        self
    }

    /// Bounds each exchange.
    #[inline]
    #[must_use]
    pub fn with_step_timeout_ms(mut self, ms: u64) -> Self {
        self.step_timeout_ms = Some(ms);
        self
    }

    /// Sets the shutdown grace period.
    #[inline]
    #[must_use]
    pub fn with_shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.shutdown_grace_ms = ms;
        self
    }

    /// Sets strict done-byte checking.
    #[inline]
    #[must_use]
    pub fn with_strict_done(mut self, strict: bool) -> Self {
        self.strict_done = strict;
        self
    }
}

// ============================================================================
// SessionConfig - Accessors
// ============================================================================

impl SessionConfig {
    /// Returns the accept timeout.
    #[inline]
    #[must_use]
    pub const fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    /// Returns the step timeout, if bounded.
    #[inline]
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the shutdown grace period.
    #[inline]
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Checks the configuration before any socket or process is created.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] on zero timeouts or an empty program
    /// - [`Error::PeerNotFound`] if an explicit peer path does not exist
    pub fn validate(&self) -> Result<()> {
        if self.accept_timeout_ms == 0 {
            return Err(Error::config("accept_timeout_ms must be greater than 0"));
        }

        if self.step_timeout_ms == Some(0) {
            return Err(Error::config(
                "step_timeout_ms must be greater than 0; omit it for no timeout",
            ));
        }

        if let Some(peer) = &self.peer {
            peer.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
