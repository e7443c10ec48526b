//! Controller side of the lockstep byte stream.
//!
//! Stream reads may return any number of bytes up to the buffer size, and
//! writes may accept fewer bytes than offered. [`Connection`] hides both: a
//! message is either transferred completely or the call fails.
//!
//! # Exchange
//!
//! One exchange is strictly:
//!
//! 1. write sentinel + action byte
//! 2. read 4-byte sentinel, fail with [`Error::Desync`] on mismatch
//! 3. read the raw frame
//! 4. read reward and done flag
//!
//! Nothing after a bad sentinel is read.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::error::{Error, Result};
use crate::frame::RawFrame;
use crate::protocol::{self, FRAME_LEN, StepResponse};

// ============================================================================
// Connection
// ============================================================================

/// Exclusive owner of the byte stream to one peer.
///
/// Generic over the stream so in-memory pipes and scripted mocks can stand
/// in for a TCP socket.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    /// Underlying byte stream.
    stream: S,
    /// Bytes received so far.
    bytes_in: u64,
    /// Bytes sent so far.
    bytes_out: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    #[inline]
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Returns the total bytes received.
    #[inline]
    #[must_use]
    pub const fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Returns the total bytes sent.
    #[inline]
    #[must_use]
    pub const fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Returns the underlying stream.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Reads exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the peer closes before `n` bytes arrive
    /// - [`Error::Io`] on other stream failures
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact_into(&mut buf).await?;
        Ok(buf)
    }

    /// Fills `buf` completely, accumulating across short reads.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the peer closes before `buf` is full
    /// - [`Error::Io`] on other stream failures
    pub async fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream
            .read_exact(buf)
            .await
            .map_err(Error::from_stream_io)?;
        self.bytes_in += buf.len() as u64;
        Ok(())
    }

    /// Writes every byte of `bytes`, then flushes.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the peer disconnects
    /// - [`Error::Io`] on other stream failures
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(Error::from_stream_io)?;
        self.bytes_out += bytes.len() as u64;
        self.stream.flush().await.map_err(Error::from_stream_io)
    }

    /// Sends one action message.
    ///
    /// # Errors
    ///
    /// See [`Connection::write_all`].
    pub async fn send_action(&mut self, code: u8) -> Result<()> {
        self.write_all(&protocol::encode_action(code)).await?;
        trace!(action = code, "Action sent");
        Ok(())
    }

    /// Receives one response, checking the sentinel before anything else.
    ///
    /// # Errors
    ///
    /// - [`Error::Desync`] if the sentinel does not match
    /// - [`Error::Protocol`] if `strict_done` is set and the done byte is not 0/1
    /// - [`Error::ConnectionClosed`] if the peer closes mid-message
    pub async fn recv_response(&mut self, strict_done: bool) -> Result<StepResponse> {
        let mut field = [0u8; 4];
        self.read_exact_into(&mut field).await?;
        protocol::check_sentinel(field)?;

        let frame = RawFrame::new(self.read_exact(FRAME_LEN).await?)?;

        self.read_exact_into(&mut field).await?;
        let reward = protocol::decode_reward(field);

        let mut done = [0u8; 1];
        self.read_exact_into(&mut done).await?;
        let done = protocol::decode_done(done[0], strict_done)?;

        trace!(reward, done, "Response received");

        Ok(StepResponse {
            frame,
            reward,
            done,
        })
    }

    /// Runs one full lockstep exchange.
    ///
    /// # Errors
    ///
    /// Any error from [`Connection::send_action`] or
    /// [`Connection::recv_response`].
    pub async fn exchange(&mut self, code: u8, strict_done: bool) -> Result<StepResponse> {
        self.send_action(code).await?;
        self.recv_response(strict_done).await
    }

    /// Half-closes the stream so the peer sees end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the shutdown fails for a reason other than the
    /// peer already being gone.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.stream.shutdown().await.map_err(Error::from_stream_io) {
            Ok(()) | Err(Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
