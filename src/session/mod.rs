//! Bridge sessions.
//!
//! A session manages one peer for its whole life: it binds the listening
//! endpoint, launches the peer with the port, accepts its connection and then
//! drives it one lockstep exchange at a time.
//!
//! # Example
//!
//! ```ignore
//! use lockstep_bridge::Session;
//!
//! let mut session = Session::builder()
//!     .program("./target/release/bullettest")
//!     .launch()
//!     .await?;
//!
//! let mut observation = session.reset().await?;
//! loop {
//!     let result = session.step(0).await?;
//!     observation = result.observation;
//!     if result.done {
//!         observation = session.reset().await?;
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent configuration builder |
//! | `config` | Serializable session and peer configuration |
//! | `core` | Session state machine |
//! | `env` | Reset/step trait for training loops |
//! | `state` | Lifecycle states |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent configuration builder.
pub mod builder;

/// Serializable session and peer configuration.
pub mod config;

/// Session state machine.
pub mod core;

/// Reset/step trait for training loops.
pub mod env;

/// Peer process spawning and teardown.
mod process;

/// Lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use config::{PeerCommand, SessionConfig};
pub use core::{PendingSession, Session};
pub use env::{Environment, StepResult};
pub use state::SessionState;
