//! Lockstep bridge - drive out-of-process games from a training loop.
//!
//! This library lets a controller drive independently running game or
//! simulation processes one tick at a time: send a discrete action, receive a
//! rendered frame, a reward and an episode-end flag.
//!
//! # Architecture
//!
//! The bridge follows an inverted client-server model:
//!
//! - **Bridge (Rust)**: Listens on a local port, launches the peer, sends actions
//! - **Peer (game process)**: Connects back to the port, answers each action
//!   with one frame
//!
//! Key design principles:
//!
//! - Each [`Session`] owns: peer process + TCP connection + frame codec
//! - Every message starts with the sentinel `0x1337BEEF`; a mismatch is fatal
//! - Strict lockstep: one outstanding action per connection
//! - Frames are reduced to a `[3][84][84]` observation with linear interpolation
//!
//! # Quick Start
//!
//! ```no_run
//! use lockstep_bridge::{Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Launch the peer; it receives the port as its last argument
//!     let mut session = Session::builder()
//!         .program("./target/release/bullettest")
//!         .launch()
//!         .await?;
//!
//!     // First reset is local: the peer starts at its initial state
//!     let _observation = session.reset().await?;
//!
//!     // Step with a flat action index
//!     let result = session.step(5).await?;
//!     println!("reward = {}, done = {}", result.reward, result.done);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`frame`] | [`RawFrame`], [`Observation`], [`FrameCodec`] |
//! | [`identifiers`] | Session identifiers |
//! | [`protocol`] | Wire constants, actions, message encoding |
//! | [`session`] | [`Session`] lifecycle, configuration, [`Environment`] |
//! | [`transport`] | TCP endpoints on both sides of the stream |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Frame preprocessing.
///
/// Raw peer frames and the observation tensors derived from them.
pub mod frame;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol.
///
/// Pure encode/decode logic, no I/O.
pub mod protocol;

/// Session lifecycle.
///
/// Use [`Session::builder()`] to launch a peer.
pub mod session;

/// TCP transport layer.
///
/// Listener, controller-side connection and peer-side client.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Frame types
pub use frame::{FrameCodec, Observation, RawFrame};

// Identifier types
pub use identifiers::SessionId;

// Protocol types
pub use protocol::{Action, ActionEncoding, Controls};

// Session types
pub use session::{
    Environment, PeerCommand, PendingSession, Session, SessionBuilder, SessionConfig,
    SessionState, StepResult,
};

// Transport types
pub use transport::PeerClient;
