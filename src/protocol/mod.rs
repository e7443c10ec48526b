//! Lockstep wire protocol.
//!
//! Pure encode/decode logic, no I/O. The transport layer feeds bytes through
//! these functions in a fixed order.
//!
//! # Message Layout
//!
//! All multi-byte fields are little-endian.
//!
//! | Direction | Field | Size | Notes |
//! |-----------|-------|------|-------|
//! | controller → peer | sentinel | 4 | [`SENTINEL`] |
//! | controller → peer | action | 1 | bitmask or flat index, 0-31 |
//! | peer → controller | sentinel | 4 | must equal [`SENTINEL`] |
//! | peer → controller | frame | [`FRAME_LEN`] | RGBA, row-major, no padding |
//! | peer → controller | reward | 4 | IEEE-754 `f32` |
//! | peer → controller | done | 1 | `1` = true, `0` = false |
//!
//! The sentinel precedes every message in both directions. It is the only
//! integrity check: a corrupted payload that does not shift the stream goes
//! unnoticed.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | Action codes, control bitmask, encodings |
//! | `message` | Message encode/decode |

// ============================================================================
// Submodules
// ============================================================================

/// Action codes and control bitmask.
pub mod action;

/// Message encode/decode.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{Action, ActionEncoding, Controls};
pub use message::{
    StepResponse, check_sentinel, decode_action, decode_done, decode_response, decode_reward,
    encode_action, encode_response,
};

// ============================================================================
// Constants
// ============================================================================

/// Marker prefixed to every message to detect stream misalignment.
pub const SENTINEL: u32 = 0x1337_BEEF;

/// Little-endian byte form of [`SENTINEL`].
pub const SENTINEL_BYTES: [u8; 4] = SENTINEL.to_le_bytes();

/// Width of a raw frame in pixels.
pub const FRAME_WIDTH: usize = 384;

/// Height of a raw frame in pixels.
pub const FRAME_HEIGHT: usize = 448;

/// Bytes per raw frame pixel (RGBA).
pub const FRAME_CHANNELS: usize = 4;

/// Length of a raw frame in bytes.
pub const FRAME_LEN: usize = FRAME_WIDTH * FRAME_HEIGHT * FRAME_CHANNELS;

/// Length of an outbound action message (sentinel + action byte).
pub const ACTION_MESSAGE_LEN: usize = 5;

/// Length of a complete inbound response.
pub const RESPONSE_LEN: usize = 4 + FRAME_LEN + 4 + 1;

/// Number of distinct actions (5 binary controls).
pub const ACTION_COUNT: usize = 32;
