//! Session lifecycle and lockstep state machine.
//!
//! A session owns one peer connection (and, when it launched it, the peer
//! process). Opening happens in two stages so the port is known before the
//! peer connects:
//!
//! ```ignore
//! let pending = Session::listen(config).await?;   // AwaitingPeer
//! println!("peer should connect to {}", pending.port());
//! let mut session = pending.accept().await?;      // Ready
//!
//! let first = session.reset().await?;
//! let result = session.step(5).await?;
//! session.close().await?;
//! ```
//!
//! [`Session::launch`] does both stages at once.
//!
//! # Failure
//!
//! Any error raised by the exchange itself moves the session to
//! [`SessionState::Terminated`]; later calls return
//! [`Error::SessionTerminated`] without touching the stream. A step future
//! dropped mid-exchange is treated the same way.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::frame::{FrameCodec, Observation, RawFrame};
use crate::identifiers::SessionId;
use crate::protocol::{Action, ActionEncoding, StepResponse};
use crate::transport::{Connection, PendingServer};

use super::builder::SessionBuilder;
use super::config::SessionConfig;
use super::env::StepResult;
use super::process::{self, ProcessGuard};
use super::state::SessionState;

// ============================================================================
// PendingSession
// ============================================================================

/// A session that is listening but has no peer yet.
pub struct PendingSession {
    /// Session identifier, kept once connected.
    id: SessionId,
    /// Configuration the session was opened with.
    config: SessionConfig,
    /// Bound listener.
    server: PendingServer,
    /// Launched peer, if any.
    process: Option<ProcessGuard>,
}

impl fmt::Debug for PendingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSession")
            .field("id", &self.id)
            .field("port", &self.port())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl PendingSession {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the port the peer must connect to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Returns the launched peer's process ID.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(ProcessGuard::pid)
    }

    /// Always [`SessionState::AwaitingPeer`].
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        SessionState::AwaitingPeer
    }

    /// Waits for the peer to connect.
    ///
    /// A launched peer that exits first fails the accept immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::PeerLaunchTimeout`] if nobody connects within the accept timeout
    /// - [`Error::PeerExited`] if the launched peer exits before connecting
    pub async fn accept(self) -> Result<Session> {
        let Self {
            id,
            config,
            server,
            mut process,
        } = self;

        let port = server.port();
        let accept = server.accept(config.accept_timeout());

        let (stream, _) = match process.as_mut() {
            Some(guard) => {
                let pid = guard.pid();
                tokio::select! {
                    biased;
                    accepted = accept => accepted?,
                    exited = guard.exited() => {
                        let status = exited?;
                        warn!(session_id = %id, pid, %status, "Peer exited before connecting");
                        return Err(Error::peer_exited(status));
                    }
                }
            }
            None => accept.await?,
        };

        info!(session_id = %id, port, "Session ready");

        let mut session = Session::new(id, Connection::new(stream), config);
        session.process = process;
        session.port = Some(port);
        Ok(session)
    }
}

// ============================================================================
// Session
// ============================================================================

/// One bridge to one peer.
///
/// Operations must be called sequentially; the session is `Send` so it can
/// move between tasks, but it is never shared.
pub struct Session<S = TcpStream> {
    /// Identifier used in logs.
    id: SessionId,
    /// Configuration the session was opened with.
    config: SessionConfig,
    /// Exclusive stream to the peer.
    connection: Connection<S>,
    /// Frame decoder.
    codec: FrameCodec,
    /// Launched peer, if any.
    process: Option<ProcessGuard>,
    /// Listening port, for TCP sessions.
    port: Option<u16>,
    /// Current lifecycle state.
    state: SessionState,
    /// Why the session was terminated.
    termination: Option<String>,
    /// Completed `step` calls.
    steps: u64,
    /// Frame from the most recent exchange.
    last_frame: Option<RawFrame>,
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("port", &self.port)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Opening
// ============================================================================

impl Session<TcpStream> {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Binds the listener and launches the configured peer.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::PeerNotFound`] if the configuration is invalid
    /// - [`Error::Bind`] if the listening endpoint cannot be bound
    /// - [`Error::ProcessLaunchFailed`] if the peer cannot be started
    pub async fn listen(config: SessionConfig) -> Result<PendingSession> {
        config.validate()?;

        let id = SessionId::generate();
        debug!(session_id = %id, state = %SessionState::Unopened, "Opening session");

        let server = PendingServer::bind(config.bind_ip, config.port).await?;
        let port = server.port();

        let process = match &config.peer {
            Some(peer) => Some(process::spawn(peer, port)?),
            None => {
                info!(session_id = %id, port, "Waiting for externally launched peer");
                None
            }
        };

        debug!(session_id = %id, port, state = %SessionState::AwaitingPeer, "Listening");

        Ok(PendingSession {
            id,
            config,
            server,
            process,
        })
    }

    /// Binds, launches the peer and waits for it to connect.
    ///
    /// # Errors
    ///
    /// Any error from [`Session::listen`] or [`PendingSession::accept`].
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        Self::listen(config).await?.accept().await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream that is already connected to a peer.
    ///
    /// Peer-related settings in `config` are ignored.
    #[must_use]
    pub fn from_stream(stream: S, config: SessionConfig) -> Self {
        let id = SessionId::generate();
        debug!(session_id = %id, "Session attached to stream");
        Self::new(id, Connection::new(stream), config)
    }

    fn new(id: SessionId, connection: Connection<S>, config: SessionConfig) -> Self {
        Self {
            id,
            config,
            connection,
            codec: FrameCodec::new(),
            process: None,
            port: None,
            state: SessionState::Ready,
            termination: None,
            steps: 0,
            last_frame: None,
        }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl<S> Session<S> {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the listening port, for TCP sessions.
    #[inline]
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the launched peer's process ID.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(ProcessGuard::pid)
    }

    /// Returns the number of completed `step` calls.
    #[inline]
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Returns `true` once `step` has succeeded at least once.
    #[inline]
    #[must_use]
    pub fn has_stepped(&self) -> bool {
        self.steps > 0
    }

    /// Returns the action encoding fixed for this session.
    #[inline]
    #[must_use]
    pub fn encoding(&self) -> ActionEncoding {
        self.config.encoding
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the raw frame from the most recent exchange.
    #[inline]
    #[must_use]
    pub fn last_frame(&self) -> Option<&RawFrame> {
        self.last_frame.as_ref()
    }
}

// ============================================================================
// Session - Environment Operations
// ============================================================================

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends one action and returns the decoded result.
    ///
    /// `done` is reported but does not change the session state.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `action` does not fit the session's
    ///   encoding (nothing is sent, the session stays usable)
    /// - [`Error::SessionTerminated`] if the session was poisoned earlier
    /// - [`Error::Desync`], [`Error::ConnectionClosed`], [`Error::Protocol`],
    ///   [`Error::StepTimeout`]: fatal, the session is terminated
    pub async fn step(&mut self, action: impl Into<Action>) -> Result<StepResult> {
        self.ensure_ready()?;

        let code = self.config.encoding.encode(action.into())?;
        let response = self.exchange(code).await?;
        self.steps += 1;

        Ok(self.finish(response))
    }

    /// Starts a new episode.
    ///
    /// Before the first `step` this returns a zero-filled observation without
    /// contacting the peer. Afterwards it performs one exchange with the
    /// no-op action and returns that frame; reward and done are discarded.
    ///
    /// # Errors
    ///
    /// Same as [`Session::step`], except for [`Error::InvalidArgument`].
    pub async fn reset(&mut self) -> Result<Observation> {
        self.ensure_ready()?;

        if !self.has_stepped() {
            debug!(session_id = %self.id, "Reset before first step, no exchange");
            return Ok(Observation::zeros());
        }

        let encoding = self.config.encoding;
        let code = encoding.encode(encoding.noop())?;
        let response = self.exchange(code).await?;

        debug!(session_id = %self.id, "Reset with no-op exchange");
        Ok(self.finish(response).observation)
    }

    /// Shuts the session down and reaps the peer.
    ///
    /// The stream is half-closed first so the peer sees end-of-stream; a
    /// launched peer then gets the configured grace period to exit before it
    /// is killed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the stream could not be shut down. The peer is
    /// reaped regardless.
    pub async fn close(mut self) -> Result<()> {
        self.state = SessionState::Terminated;

        let shutdown = self.connection.shutdown().await;
        if let Some(process) = self.process.as_mut() {
            process.shutdown(self.config.shutdown_grace()).await;
        }

        info!(session_id = %self.id, steps = self.steps, "Session closed");
        shutdown
    }
}

// ============================================================================
// Session - Internals
// ============================================================================

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Rejects calls on a session that can no longer exchange.
    fn ensure_ready(&mut self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Stepping => {
                // A previous step future was dropped between send and receive
                self.terminate("previous exchange was cancelled mid-cycle".to_string());
                Err(Error::session_terminated(
                    "previous exchange was cancelled mid-cycle",
                ))
            }
            SessionState::Terminated => Err(Error::session_terminated(
                self.termination.as_deref().unwrap_or("session closed"),
            )),
            state => Err(Error::session_terminated(format!("session is {state}"))),
        }
    }

    /// Runs one exchange, terminating the session on any failure.
    async fn exchange(&mut self, code: u8) -> Result<StepResponse> {
        self.state = SessionState::Stepping;
        trace!(session_id = %self.id, action = code, "Exchange started");

        let strict_done = self.config.strict_done;
        let result = match self.config.step_timeout() {
            Some(limit) => timeout(limit, self.connection.exchange(code, strict_done))
                .await
                .unwrap_or_else(|_| Err(Error::step_timeout(limit.as_millis() as u64))),
            None => self.connection.exchange(code, strict_done).await,
        };

        match result {
            Ok(response) => {
                self.state = SessionState::Ready;
                Ok(response)
            }
            Err(e) => {
                self.terminate(e.to_string());
                Err(e)
            }
        }
    }

    /// Decodes a response and records its frame.
    fn finish(&mut self, response: StepResponse) -> StepResult {
        let StepResponse {
            frame,
            reward,
            done,
        } = response;

        let observation = self.codec.decode(&frame);
        self.last_frame = Some(frame);

        trace!(session_id = %self.id, reward, done, "Exchange complete");

        StepResult {
            observation,
            reward,
            done,
        }
    }

    fn terminate(&mut self, reason: String) {
        warn!(session_id = %self.id, reason = %reason, "Session terminated");
        self.state = SessionState::Terminated;
        self.termination = Some(reason);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::duplex;
    use tokio_test::io::Builder;

    use crate::frame::OBSERVATION_LEN;
    use crate::protocol::{Controls, FRAME_LEN, encode_action, encode_response};
    use crate::transport::PeerClient;

    fn solid_response(value: u8, reward: f32, done: bool) -> Vec<u8> {
        encode_response(&vec![value; FRAME_LEN], reward, done).unwrap()
    }

    fn assert_solid(observation: &Observation, value: u8) {
        assert_eq!(observation.shape(), [3, 84, 84]);
        assert!(observation.as_slice().iter().all(|&v| v == value));
    }

    // ========================================================================
    // Reset
    // ========================================================================

    #[tokio::test]
    async fn test_reset_before_step_has_no_exchange() {
        let mock = Builder::new().build();
        let mut session = Session::from_stream(mock, SessionConfig::default());

        let observation = session.reset().await.unwrap();
        assert!(observation.is_zeroed());
        assert_eq!(observation.as_slice().len(), OBSERVATION_LEN);

        // Repeated resets stay local too
        session.reset().await.unwrap();
        assert_eq!(session.connection.bytes_out(), 0);
        assert_eq!(session.connection.bytes_in(), 0);
        assert!(session.last_frame().is_none());
    }

    #[tokio::test]
    async fn test_reset_after_step_sends_one_noop() {
        let mock = Builder::new()
            .write(&encode_action(3))
            .read(&solid_response(10, 0.0, true))
            .write(&encode_action(0))
            .read(&solid_response(200, 9.0, true))
            .build();
        let mut session = Session::from_stream(mock, SessionConfig::default());

        let result = session.step(3).await.unwrap();
        assert!(result.done);
        assert_eq!(session.state(), SessionState::Ready);

        let observation = session.reset().await.unwrap();
        assert_solid(&observation, 200);
        assert_eq!(session.steps(), 1);
        assert_eq!(session.connection.bytes_out(), 10);
    }

    // ========================================================================
    // Step
    // ========================================================================

    #[tokio::test]
    async fn test_step_gray_frame_end_to_end() {
        let mock = Builder::new()
            .write(&encode_action(0x05))
            .read(&solid_response(128, 1.5, false))
            .build();
        let mut session = Session::from_stream(mock, SessionConfig::default());

        let result = session.step(5).await.unwrap();
        assert_solid(&result.observation, 128);
        assert_eq!(result.reward, 1.5);
        assert!(!result.done);
        assert!(session.has_stepped());
        assert_eq!(session.last_frame().unwrap().as_bytes().len(), FRAME_LEN);
    }

    #[tokio::test]
    async fn test_step_bitmask_encoding() {
        let config = SessionConfig::default().with_encoding(ActionEncoding::Bitmask);
        let mock = Builder::new()
            .write(&encode_action(0x11))
            .read(&solid_response(1, 0.0, false))
            .write(&encode_action(0x00))
            .read(&solid_response(2, 0.0, false))
            .build();
        let mut session = Session::from_stream(mock, config);

        session.step(Controls::UP | Controls::FOCUS).await.unwrap();
        assert_solid(&session.reset().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_action_is_not_fatal() {
        let mock = Builder::new()
            .write(&encode_action(31))
            .read(&solid_response(0, 0.0, false))
            .build();
        let mut session = Session::from_stream(mock, SessionConfig::default());

        assert!(matches!(
            session.step(32).await,
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            session.step(Controls::LEFT).await,
            Err(Error::InvalidArgument { .. })
        ));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.connection.bytes_out(), 0);

        session.step(31).await.unwrap();
    }

    #[tokio::test]
    async fn test_done_does_not_terminate() {
        let mock = Builder::new()
            .write(&encode_action(1))
            .read(&solid_response(0, 0.0, true))
            .write(&encode_action(1))
            .read(&solid_response(0, 0.0, true))
            .build();
        let mut session = Session::from_stream(mock, SessionConfig::default());

        assert!(session.step(1).await.unwrap().done);
        assert!(session.step(1).await.unwrap().done);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.steps(), 2);
    }

    // ========================================================================
    // Failure
    // ========================================================================

    #[tokio::test]
    async fn test_desync_terminates_session() {
        let mock = Builder::new()
            .write(&encode_action(4))
            .read(&[0, 0, 0, 0])
            .build();
        let mut session = Session::from_stream(mock, SessionConfig::default());

        let err = session.step(4).await.unwrap_err();
        assert!(matches!(err, Error::Desync { found: 0 }));
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Terminated);

        let bytes_out = session.connection.bytes_out();
        assert!(matches!(
            session.step(4).await,
            Err(Error::SessionTerminated { .. })
        ));
        assert!(matches!(
            session.reset().await,
            Err(Error::SessionTerminated { .. })
        ));
        assert_eq!(session.connection.bytes_out(), bytes_out);
    }

    #[tokio::test]
    async fn test_peer_disconnect_terminates_session() {
        let (peer, controller) = duplex(1024);
        drop(peer);

        let mut session = Session::from_stream(controller, SessionConfig::default());
        assert!(matches!(
            session.step(0).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(session.state().is_terminated());
    }

    #[tokio::test]
    async fn test_step_timeout_terminates_session() {
        let (_peer, controller) = duplex(1024);
        let config = SessionConfig::default().with_step_timeout_ms(30);
        let mut session = Session::from_stream(controller, config);

        assert!(matches!(
            session.step(1).await,
            Err(Error::StepTimeout { timeout_ms: 30 })
        ));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_cancelled_step_poisons_session() {
        let (_peer, controller) = duplex(1024);
        let mut session = Session::from_stream(controller, SessionConfig::default());

        let cancelled = tokio::time::timeout(Duration::from_millis(30), session.step(1)).await;
        assert!(cancelled.is_err());
        assert_eq!(session.state(), SessionState::Stepping);

        assert!(matches!(
            session.step(1).await,
            Err(Error::SessionTerminated { .. })
        ));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    // ========================================================================
    // TCP
    // ========================================================================

    /// Peer loop answering every action with a frame filled by the action byte.
    async fn echo_peer(port: u16) {
        let mut peer = PeerClient::connect(port).await.unwrap();
        let mut frame = vec![0u8; FRAME_LEN];
        while let Ok(action) = peer.recv_action().await {
            frame.fill(action);
            if peer.send_step(&frame, f32::from(action), false).await.is_err() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_listen_then_accept_external_peer() {
        let pending = Session::listen(SessionConfig::default()).await.unwrap();
        assert_eq!(pending.state(), SessionState::AwaitingPeer);
        assert!(pending.pid().is_none());

        let peer = tokio::spawn(echo_peer(pending.port()));
        let mut session = pending.accept().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.port().is_some());

        let result = session.step(9).await.unwrap();
        assert_solid(&result.observation, 9);
        assert_eq!(result.reward, 9.0);

        session.close().await.unwrap();
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_run_concurrently() {
        let first = Session::listen(SessionConfig::default()).await.unwrap();
        let second = Session::listen(SessionConfig::default()).await.unwrap();
        assert_ne!(first.port(), second.port());

        tokio::spawn(echo_peer(first.port()));
        tokio::spawn(echo_peer(second.port()));

        let (first, second) = tokio::join!(first.accept(), second.accept());
        let (mut first, mut second) = (first.unwrap(), second.unwrap());

        for action in 0..4u8 {
            let (a, b) = tokio::join!(first.step(action), second.step(31 - action));
            assert_solid(&a.unwrap().observation, action);
            assert_solid(&b.unwrap().observation, 31 - action);
        }

        assert_ne!(first.id(), second.id());
        first.close().await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_accept_timeout_without_peer() {
        let config = SessionConfig::default().with_accept_timeout_ms(50);
        let err = Session::launch(config).await.unwrap_err();
        assert!(matches!(err, Error::PeerLaunchTimeout { timeout_ms: 50 }));
        assert!(err.is_timeout());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_peer_exit_before_connect_is_reported() {
        use crate::session::PeerCommand;

        let peer = PeerCommand::native("sh").with_args(["-c", "exit 3"]);
        let config = SessionConfig::for_peer(peer).with_accept_timeout_ms(10_000);

        let err = Session::launch(config).await.unwrap_err();
        assert!(matches!(err, Error::PeerExited { .. }));
    }
}
