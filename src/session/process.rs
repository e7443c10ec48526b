//! Peer process spawning and teardown.

// ============================================================================
// Imports
// ============================================================================

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::config::PeerCommand;

// ============================================================================
// Spawning
// ============================================================================

/// Launches `peer` with `port` as its final argument.
///
/// # Errors
///
/// Returns [`Error::ProcessLaunchFailed`] if the OS refuses to start it.
pub(crate) fn spawn(peer: &PeerCommand, port: u16) -> Result<ProcessGuard> {
    let mut command = Command::new(&peer.program);
    command.args(peer.to_args(port)).stdin(Stdio::null());

    if !peer.inherit_stdio {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    if let Some(dir) = &peer.current_dir {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(Error::process_launch_failed)?;
    let guard = ProcessGuard::new(child);

    info!(
        pid = guard.pid(),
        port,
        program = %peer.program.display(),
        "Peer spawned"
    );

    Ok(guard)
}

// ============================================================================
// ProcessGuard
// ============================================================================

/// Guards a peer process and ensures it is killed when dropped.
#[derive(Debug)]
pub(crate) struct ProcessGuard {
    /// The child process handle.
    child: Option<Child>,
    /// Process ID for logging.
    pid: u32,
}

impl ProcessGuard {
    /// Creates a new process guard.
    pub(crate) fn new(child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Process guard created");
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Returns the process ID.
    #[inline]
    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    /// Waits for the process to exit on its own.
    ///
    /// Pending forever once the process has been reaped, so it can sit in a
    /// `select!` next to an accept without firing twice.
    pub(crate) async fn exited(&mut self) -> Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => Ok(child.wait().await?),
            None => std::future::pending().await,
        }
    }

    /// Gives the process `grace` to exit, then kills and reaps it.
    pub(crate) async fn shutdown(&mut self, grace: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid = self.pid, %status, "Peer exited");
                return;
            }
            Ok(Err(e)) => debug!(pid = self.pid, error = %e, "Failed to wait for peer"),
            Err(_) => warn!(
                pid = self.pid,
                grace_ms = grace.as_millis() as u64,
                "Peer still running after grace period, killing"
            ),
        }

        if let Err(e) = child.kill().await {
            debug!(pid = self.pid, error = %e, "Failed to kill peer");
        }
        info!(pid = self.pid, "Peer terminated");
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_port_reaches_peer_as_last_argument() {
        // `sh -c 'exit "$1"' sh <port>` exits with the port's low byte
        let peer = PeerCommand::native("sh").with_args(["-c", "exit \"$1\"", "sh"]);
        let mut guard = spawn(&peer, 42).unwrap();

        let status = guard.exited().await.unwrap();
        assert_eq!(status.code(), Some(42));
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let peer = PeerCommand::native("lockstep-bridge-no-such-peer");
        assert!(matches!(
            spawn(&peer, 1),
            Err(Error::ProcessLaunchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_kills_after_grace() {
        let peer = PeerCommand::native("sleep").with_arg("30");
        let mut guard = spawn(&peer, 0).unwrap();
        assert!(guard.pid() > 0);

        let started = std::time::Instant::now();
        guard.shutdown(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(guard.child.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_clean_exit() {
        let peer = PeerCommand::native("sh").with_args(["-c", "exit 0"]);
        let mut guard = spawn(&peer, 0).unwrap();

        guard.shutdown(Duration::from_secs(5)).await;
        assert!(guard.child.is_none());

        // Idempotent
        guard.shutdown(Duration::from_secs(5)).await;
    }
}
