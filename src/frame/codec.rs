//! Raw frame → observation pipeline.
//!
//! The resize samples the source on the same half-pixel-centred grid as
//! OpenCV's `INTER_LINEAR` and blends with 11-bit fixed-point weights, so the
//! output is integer-exact and identical on every platform.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::{FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH};

use super::{OBSERVATION_CHANNELS, OBSERVATION_LEN, OBSERVATION_SIZE, Observation, RawFrame};

// ============================================================================
// Constants
// ============================================================================

/// Fractional bits of the interpolation weights.
const WEIGHT_BITS: u32 = 11;

/// Sum of the two weights of one tap.
const WEIGHT_ONE: i32 = 1 << WEIGHT_BITS;

/// Shift that removes both weight scales after the vertical pass.
const OUTPUT_SHIFT: u32 = WEIGHT_BITS * 2;

// ============================================================================
// Tap
// ============================================================================

/// Two neighbouring source indices and their fixed-point weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tap {
    lo: usize,
    hi: usize,
    w_lo: i32,
    w_hi: i32,
}

/// Computes the linear-interpolation taps mapping `src` samples onto `dst`.
fn axis_taps(src: usize, dst: usize) -> Vec<Tap> {
    let scale = src as f64 / dst as f64;
    let last = src - 1;

    (0..dst)
        .map(|d| {
            let pos = ((d as f64 + 0.5) * scale - 0.5) as f32;
            let floor = pos.floor();
            let mut frac = pos - floor;

            // Clamp to the edge and sample it unblended
            let lo = if floor < 0.0 {
                frac = 0.0;
                0
            } else if floor as usize >= last {
                frac = 0.0;
                last
            } else {
                floor as usize
            };

            let w_lo = ((1.0 - frac) * WEIGHT_ONE as f32).round() as i32;
            Tap {
                lo,
                hi: (lo + 1).min(last),
                w_lo,
                w_hi: WEIGHT_ONE - w_lo,
            }
        })
        .collect()
}

// ============================================================================
// FrameCodec
// ============================================================================

/// Converts [`RawFrame`]s into [`Observation`]s.
///
/// Pure and deterministic: the same frame always yields the same bytes. The
/// alpha channel is never read, so it cannot influence the output.
///
/// The interpolation grid is precomputed once; a codec can be shared freely.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    x_taps: Vec<Tap>,
    y_taps: Vec<Tap>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Creates a codec for the fixed frame and observation geometry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            x_taps: axis_taps(FRAME_WIDTH, OBSERVATION_SIZE),
            y_taps: axis_taps(FRAME_HEIGHT, OBSERVATION_SIZE),
        }
    }

    /// Decodes a raw frame into a channel-first observation.
    ///
    /// Drop-alpha, resize and transpose are fused into one pass; the result
    /// is the same as running them in sequence.
    #[must_use]
    pub fn decode(&self, frame: &RawFrame) -> Observation {
        let src = frame.as_bytes();
        let row_stride = FRAME_WIDTH * FRAME_CHANNELS;
        let plane = OBSERVATION_SIZE * OBSERVATION_SIZE;
        let mut out = vec![0u8; OBSERVATION_LEN];

        for (dy, ty) in self.y_taps.iter().enumerate() {
            let row_lo = &src[ty.lo * row_stride..(ty.lo + 1) * row_stride];
            let row_hi = &src[ty.hi * row_stride..(ty.hi + 1) * row_stride];

            for (dx, tx) in self.x_taps.iter().enumerate() {
                let left = tx.lo * FRAME_CHANNELS;
                let right = tx.hi * FRAME_CHANNELS;

                for c in 0..OBSERVATION_CHANNELS {
                    let h_lo = i32::from(row_lo[left + c]) * tx.w_lo
                        + i32::from(row_lo[right + c]) * tx.w_hi;
                    let h_hi = i32::from(row_hi[left + c]) * tx.w_lo
                        + i32::from(row_hi[right + c]) * tx.w_hi;

                    let value =
                        (h_lo * ty.w_lo + h_hi * ty.w_hi + (1 << (OUTPUT_SHIFT - 1))) >> OUTPUT_SHIFT;

                    out[c * plane + dy * OBSERVATION_SIZE + dx] = value.clamp(0, 255) as u8;
                }
            }
        }

        Observation::from_decoded(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
