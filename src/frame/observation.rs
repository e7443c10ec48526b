//! Model input tensor.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::{Error, Result};

use super::{OBSERVATION_CHANNELS, OBSERVATION_LEN, OBSERVATION_SIZE};

// ============================================================================
// Observation
// ============================================================================

/// Down-scaled, channel-first `u8` image: `[3][84][84]`.
///
/// Derived deterministically from exactly one [`RawFrame`](super::RawFrame),
/// or zero-filled as the placeholder returned by a reset before any step.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Observation {
    data: Vec<u8>,
}

impl Observation {
    /// Tensor shape as `[channels, height, width]`.
    pub const SHAPE: [usize; 3] = [OBSERVATION_CHANNELS, OBSERVATION_SIZE, OBSERVATION_SIZE];

    /// Returns a zero-filled observation.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            data: vec![0; OBSERVATION_LEN],
        }
    }

    /// Wraps channel-first data, validating its length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `data` is not exactly
    /// `3 * 84 * 84` bytes.
    pub fn from_chw(data: Vec<u8>) -> Result<Self> {
        if data.len() != OBSERVATION_LEN {
            return Err(Error::invalid_argument(format!(
                "observation must be {OBSERVATION_LEN} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// Wraps codec output whose length is fixed by construction.
    pub(super) fn from_decoded(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), OBSERVATION_LEN);
        Self { data }
    }

    /// Returns the tensor shape.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> [usize; 3] {
        Self::SHAPE
    }

    /// Returns the flat channel-first data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the observation, returning its data.
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Returns one channel plane, row-major.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= 3`.
    #[must_use]
    pub fn channel(&self, channel: usize) -> &[u8] {
        let plane = OBSERVATION_SIZE * OBSERVATION_SIZE;
        &self.data[channel * plane..(channel + 1) * plane]
    }

    /// Returns the value at `[channel][y][x]`.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, channel: usize, y: usize, x: usize) -> u8 {
        assert!(
            channel < OBSERVATION_CHANNELS && y < OBSERVATION_SIZE && x < OBSERVATION_SIZE,
            "index [{channel}][{y}][{x}] out of bounds"
        );
        self.data[(channel * OBSERVATION_SIZE + y) * OBSERVATION_SIZE + x]
    }

    /// Returns `true` if every value is zero.
    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Converts back to an interleaved image at observation resolution.
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        let side = OBSERVATION_SIZE as u32;
        RgbImage::from_fn(side, side, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([self.get(0, y, x), self.get(1, y, x), self.get(2, y, x)])
        })
    }

    /// Nearest-neighbour upscale for previews.
    ///
    /// A `scale` of zero is treated as one.
    #[must_use]
    pub fn upscaled(&self, scale: u32) -> RgbImage {
        let side = OBSERVATION_SIZE as u32 * scale.max(1);
        imageops::resize(&self.to_rgb_image(), side, side, FilterType::Nearest)
    }

    /// Writes an upscaled preview as a PNG file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if encoding or writing fails.
    pub fn save_png(&self, path: impl AsRef<Path>, scale: u32) -> Result<()> {
        self.upscaled(scale).save(path.as_ref())?;
        Ok(())
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("shape", &Self::SHAPE)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::frame::PREVIEW_SCALE;

    fn ramp() -> Observation {
        let data = (0..OBSERVATION_LEN).map(|i| (i % 251) as u8).collect();
        Observation::from_chw(data).unwrap()
    }

    #[test]
    fn test_zeros_shape() {
        let obs = Observation::zeros();
        assert_eq!(obs.shape(), [3, 84, 84]);
        assert_eq!(obs.as_slice().len(), OBSERVATION_LEN);
        assert!(obs.is_zeroed());
    }

    #[test]
    fn test_from_chw_rejects_wrong_length() {
        assert!(matches!(
            Observation::from_chw(vec![0; 10]),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_get_indexes_channel_first() {
        let obs = ramp();
        let plane = OBSERVATION_SIZE * OBSERVATION_SIZE;
        let flat = plane + 3 * OBSERVATION_SIZE + 7;
        assert_eq!(obs.get(1, 3, 7), (flat % 251) as u8);
        assert_eq!(obs.channel(2)[0], ((2 * plane) % 251) as u8);
    }

    #[test]
    fn test_to_rgb_image_interleaves_channels() {
        let obs = ramp();
        let image = obs.to_rgb_image();
        let px = image.get_pixel(7, 3).0;
        assert_eq!(px, [obs.get(0, 3, 7), obs.get(1, 3, 7), obs.get(2, 3, 7)]);
    }

    #[test]
    fn test_upscaled_repeats_pixels() {
        let obs = ramp();
        let big = obs.upscaled(PREVIEW_SCALE);
        assert_eq!(big.dimensions(), (336, 336));

        let expected = obs.to_rgb_image().get_pixel(10, 20).0;
        for dy in 0..PREVIEW_SCALE {
            for dx in 0..PREVIEW_SCALE {
                assert_eq!(big.get_pixel(40 + dx, 80 + dy).0, expected);
            }
        }
    }

    #[test]
    fn test_upscaled_zero_scale_is_identity_size() {
        assert_eq!(Observation::zeros().upscaled(0).dimensions(), (84, 84));
    }
}
