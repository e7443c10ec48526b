//! Frame preprocessing.
//!
//! Turns the raw RGBA frame a peer renders into the small channel-first
//! observation a learning model consumes.
//!
//! # Pipeline
//!
//! ```text
//! RawFrame [448][384][4]  ──drop alpha──►  [448][384][3]
//!        ──linear resize──►  [84][84][3]  ──transpose──►  Observation [3][84][84]
//! ```
//!
//! The interpolation mode is part of the data contract: observations must be
//! bit-for-bit reproducible across runs, and a model trained on linearly
//! resized frames sees a different distribution under any other filter.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `raw` | [`RawFrame`] - validated peer frame |
//! | `observation` | [`Observation`] - model input tensor |
//! | `codec` | [`FrameCodec`] - the preprocessing pipeline |

// ============================================================================
// Submodules
// ============================================================================

/// The preprocessing pipeline.
pub mod codec;

/// Model input tensor.
pub mod observation;

/// Validated peer frame.
pub mod raw;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::FrameCodec;
pub use observation::Observation;
pub use raw::RawFrame;

// ============================================================================
// Constants
// ============================================================================

/// Side length of the square observation.
pub const OBSERVATION_SIZE: usize = 84;

/// Channels kept in an observation (alpha dropped).
pub const OBSERVATION_CHANNELS: usize = 3;

/// Length of an observation in bytes.
pub const OBSERVATION_LEN: usize = OBSERVATION_CHANNELS * OBSERVATION_SIZE * OBSERVATION_SIZE;

/// Nearest-neighbour upscale factor used for on-screen previews.
pub const PREVIEW_SCALE: u32 = 4;
