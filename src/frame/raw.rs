//! Raw peer frames.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::protocol::{FRAME_CHANNELS, FRAME_HEIGHT, FRAME_LEN, FRAME_WIDTH};

// ============================================================================
// RawFrame
// ============================================================================

/// One rendered image as sent by the peer.
///
/// Row-major `[height][width][4]` bytes with no padding. The length is always
/// exactly [`FRAME_LEN`]; anything else is rejected at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    /// Wraps a byte buffer, validating its length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `bytes` is not [`FRAME_LEN`] long.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != FRAME_LEN {
            return Err(Error::protocol(format!(
                "raw frame must be {FRAME_LEN} bytes ({FRAME_WIDTH}x{FRAME_HEIGHT}x{FRAME_CHANNELS}), got {}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Creates a frame filled with a single pixel value.
    #[must_use]
    pub fn solid(pixel: [u8; 4]) -> Self {
        let bytes = pixel
            .iter()
            .copied()
            .cycle()
            .take(FRAME_LEN)
            .collect();
        Self { bytes }
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the frame, returning its bytes.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the four channel bytes of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the frame.
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        assert!(x < FRAME_WIDTH && y < FRAME_HEIGHT, "pixel ({x}, {y}) out of bounds");
        let offset = (y * FRAME_WIDTH + x) * FRAME_CHANNELS;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.bytes[offset..offset + FRAME_CHANNELS]);
        px
    }

    /// Copies the frame into an image buffer for display or export.
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(FRAME_WIDTH as u32, FRAME_HEIGHT as u32, |x, y| {
            Rgba(self.pixel(x as usize, y as usize))
        })
    }

    /// Writes the frame as a PNG file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if encoding or writing fails.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgba_image().save(path.as_ref())?;
        Ok(())
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &FRAME_WIDTH)
            .field("height", &FRAME_HEIGHT)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = RawFrame::new(vec![0; FRAME_LEN - 1]).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(RawFrame::new(vec![0; FRAME_LEN]).is_ok());
    }

    #[test]
    fn test_solid_fills_every_pixel() {
        let frame = RawFrame::solid([1, 2, 3, 4]);
        assert_eq!(frame.as_bytes().len(), FRAME_LEN);
        assert_eq!(frame.pixel(0, 0), [1, 2, 3, 4]);
        assert_eq!(frame.pixel(FRAME_WIDTH - 1, FRAME_HEIGHT - 1), [1, 2, 3, 4]);
    }

    #[test]
    fn test_pixel_is_row_major() {
        let mut bytes = vec![0u8; FRAME_LEN];
        let offset = (2 * FRAME_WIDTH + 5) * FRAME_CHANNELS;
        bytes[offset..offset + 4].copy_from_slice(&[9, 8, 7, 6]);
        let frame = RawFrame::new(bytes).unwrap();

        assert_eq!(frame.pixel(5, 2), [9, 8, 7, 6]);
        assert_eq!(frame.pixel(2, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn test_to_rgba_image_dimensions() {
        let image = RawFrame::solid([10, 20, 30, 255]).to_rgba_image();
        assert_eq!(image.dimensions(), (FRAME_WIDTH as u32, FRAME_HEIGHT as u32));
        assert_eq!(image.get_pixel(100, 200).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let shown = format!("{:?}", RawFrame::solid([0; 4]));
        assert!(shown.contains("width: 384"));
        assert!(shown.len() < 100);
    }
}
