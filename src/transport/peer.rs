//! Peer side of the lockstep byte stream.
//!
//! Games embed this half: connect back to the port they were given, then
//! loop `recv_action` → tick → `send_step` until the controller goes away.

// ============================================================================
// Imports
// ============================================================================

use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::{self, ACTION_MESSAGE_LEN};

use super::Connection;

// ============================================================================
// PeerClient
// ============================================================================

/// Client endpoint used by a peer process.
#[derive(Debug)]
pub struct PeerClient<S = TcpStream> {
    connection: Connection<S>,
}

impl PeerClient<TcpStream> {
    /// Connects to the bridge listening on `127.0.0.1:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the connection is refused.
    pub async fn connect(port: u16) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        debug!(port, "Connecting to bridge");

        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        info!(port, "Connected to bridge");
        Ok(Self::from_stream(stream))
    }
}

impl<S> PeerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-connected stream.
    #[inline]
    #[must_use]
    pub fn from_stream(stream: S) -> Self {
        Self {
            connection: Connection::new(stream),
        }
    }

    /// Waits for the next action byte.
    ///
    /// # Errors
    ///
    /// - [`Error::Desync`](crate::Error::Desync) if the sentinel does not match
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) when the
    ///   controller has closed the stream
    pub async fn recv_action(&mut self) -> Result<u8> {
        let mut message = [0u8; ACTION_MESSAGE_LEN];
        self.connection.read_exact_into(&mut message).await?;
        protocol::decode_action(&message)
    }

    /// Sends the result of one tick.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`](crate::Error::Protocol) if `frame` has the wrong length
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   controller is gone
    pub async fn send_step(&mut self, frame: &[u8], reward: f32, done: bool) -> Result<()> {
        let message = protocol::encode_response(frame, reward, done)?;
        self.connection.write_all(&message).await
    }
}

// ============================================================================
// Tests
// ============================================================================
