//! Listening endpoint the peer connects back to.
//!
//! The bridge is the server and the spawned peer is the client: the peer
//! only needs the port number, passed as its last command-line argument.
//!
//! # Connection Flow
//!
//! 1. Bind to `127.0.0.1:0` (random port) or a fixed port
//! 2. Launch the peer with the port as an argument
//! 3. Accept exactly one inbound connection (with timeout)
//! 4. Hand the stream to a [`Connection`](super::Connection)

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// PendingServer
// ============================================================================

/// A listener that is bound but has not yet accepted its peer.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use std::time::Duration;
/// use lockstep_bridge::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let port = server.port();
///
/// // Launch the peer with `port`...
///
/// let (stream, addr) = server.accept(Duration::from_secs(30)).await?;
/// ```
#[derive(Debug)]
pub struct PendingServer {
    /// TCP listener for the single inbound connection.
    listener: TcpListener,
    /// Address actually bound (port resolved if 0 was requested).
    local_addr: SocketAddr,
}

impl PendingServer {
    /// Binds to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::bind(addr, e))?;
        let local_addr = listener.local_addr().map_err(|e| Error::bind(addr, e))?;

        debug!(port = local_addr.port(), "Bridge endpoint bound");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts exactly one connection, consuming the listener.
    ///
    /// Nagle's algorithm is disabled on the accepted stream: every exchange
    /// is a small request waiting on its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::PeerLaunchTimeout`] if no peer connects within `accept_timeout`
    /// - [`Error::Io`] if accepting fails
    pub async fn accept(self, accept_timeout: Duration) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = timeout(accept_timeout, self.listener.accept())
            .await
            .map_err(|_| Error::peer_launch_timeout(accept_timeout.as_millis() as u64))??;

        stream.set_nodelay(true)?;

        info!(port = self.local_addr.port(), peer = %addr, "Peer connected");

        Ok((stream, addr))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn test_server_bind_random_port() {
        let server = PendingServer::bind(LOCALHOST, 0)
            .await
            .expect("bind should succeed");

        assert!(server.port() > 0);
        assert_eq!(server.local_addr().ip(), LOCALHOST);
    }

    #[tokio::test]
    async fn test_bind_taken_port_fails_fast() {
        let first = PendingServer::bind(LOCALHOST, 0)
            .await
            .expect("bind should succeed");

        let err = PendingServer::bind(LOCALHOST, first.port())
            .await
            .expect_err("port already in use");

        assert!(matches!(err, Error::Bind { addr, .. } if addr.port() == first.port()));
    }

    #[tokio::test]
    async fn test_accept_times_out_without_peer() {
        let server = PendingServer::bind(LOCALHOST, 0)
            .await
            .expect("bind should succeed");

        let err = server
            .accept(Duration::from_millis(50))
            .await
            .expect_err("nobody connects");

        assert!(matches!(err, Error::PeerLaunchTimeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_accept_returns_connected_stream() {
        let server = PendingServer::bind(LOCALHOST, 0)
            .await
            .expect("bind should succeed");
        let addr = server.local_addr();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (stream, peer) = server
            .accept(Duration::from_secs(5))
            .await
            .expect("accept should succeed");

        let client = client.await.unwrap().unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
        assert!(stream.nodelay().unwrap());
    }
}
