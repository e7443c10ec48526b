//! TCP transport layer.
//!
//! This module moves lockstep messages between the bridge (Rust) and the
//! peer (game process) over a single TCP connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │ Session (Rust)  │                              │  Peer process   │
//! │                 │             TCP              │                 │
//! │  PendingServer  │◄────────────────────────────►│  PeerClient     │
//! │  → Connection   │      127.0.0.1:PORT          │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PendingServer::bind` - Bind to localhost with random or fixed port
//! 2. Launch the peer with the port as its last argument
//! 3. `PendingServer::accept` - Wait for the peer to connect
//! 4. `Connection` - Exchange actions and responses in lockstep
//! 5. `Connection::shutdown` - Half-close so the peer exits
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Full-read/full-write stream and exchange cycle |
//! | `peer` | Peer-side endpoint |
//! | `server` | Listener binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// Full-read/full-write stream and exchange cycle.
pub mod connection;

/// Peer-side endpoint.
pub mod peer;

/// Listener binding and acceptance.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use peer::PeerClient;
pub use server::PendingServer;
