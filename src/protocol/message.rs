//! Message encode/decode.
//!
//! The controller side encodes actions and decodes responses; the peer side
//! does the reverse. Decoding a response always checks the sentinel before
//! touching any other byte.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::frame::RawFrame;

use super::{ACTION_MESSAGE_LEN, FRAME_LEN, RESPONSE_LEN, SENTINEL, SENTINEL_BYTES};

// ============================================================================
// StepResponse
// ============================================================================

/// A fully decoded peer response.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse {
    /// Rendered frame for this tick.
    pub frame: RawFrame,
    /// Reward earned this tick.
    pub reward: f32,
    /// Whether the peer ended an episode on this tick.
    pub done: bool,
}

// ============================================================================
// Controller → Peer
// ============================================================================

/// Encodes an action message: sentinel followed by the action byte.
#[inline]
#[must_use]
pub fn encode_action(code: u8) -> [u8; ACTION_MESSAGE_LEN] {
    let [s0, s1, s2, s3] = SENTINEL_BYTES;
    [s0, s1, s2, s3, code]
}

/// Decodes an action message on the peer side.
///
/// # Errors
///
/// Returns [`Error::Desync`] if the sentinel does not match.
pub fn decode_action(message: &[u8; ACTION_MESSAGE_LEN]) -> Result<u8> {
    let [s0, s1, s2, s3, code] = *message;
    check_sentinel([s0, s1, s2, s3])?;
    Ok(code)
}

// ============================================================================
// Peer → Controller
// ============================================================================

/// Verifies a 4-byte sentinel field.
///
/// # Errors
///
/// Returns [`Error::Desync`] carrying the value actually found.
#[inline]
pub fn check_sentinel(bytes: [u8; 4]) -> Result<()> {
    let found = u32::from_le_bytes(bytes);
    if found == SENTINEL {
        Ok(())
    } else {
        Err(Error::desync(found))
    }
}

/// Decodes the reward field.
#[inline]
#[must_use]
pub fn decode_reward(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}

/// Decodes the done flag.
///
/// Only `0` and `1` are valid. With `strict` unset, any byte other than `1`
/// reads as `false`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] in strict mode for bytes other than 0/1.
#[inline]
pub fn decode_done(byte: u8, strict: bool) -> Result<bool> {
    match byte {
        1 => Ok(true),
        0 => Ok(false),
        other if strict => Err(Error::protocol(format!(
            "done flag must be 0 or 1, got {other}"
        ))),
        _ => Ok(false),
    }
}

/// Decodes a complete response held in memory.
///
/// # Errors
///
/// - [`Error::Desync`] if the leading sentinel does not match
/// - [`Error::Protocol`] if the length is wrong or the done flag is invalid
pub fn decode_response(bytes: &[u8], strict: bool) -> Result<StepResponse> {
    if bytes.len() < SENTINEL_BYTES.len() {
        return Err(Error::protocol(format!(
            "response truncated to {} bytes",
            bytes.len()
        )));
    }

    let (sentinel, rest) = bytes.split_at(SENTINEL_BYTES.len());
    check_sentinel(le_field(sentinel))?;

    if bytes.len() != RESPONSE_LEN {
        return Err(Error::protocol(format!(
            "response length {} != {RESPONSE_LEN}",
            bytes.len()
        )));
    }

    let (frame, trailer) = rest.split_at(FRAME_LEN);
    let (reward, done) = trailer.split_at(4);

    Ok(StepResponse {
        frame: RawFrame::new(frame.to_vec())?,
        reward: decode_reward(le_field(reward)),
        done: decode_done(done[0], strict)?,
    })
}

/// Encodes a complete response on the peer side.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `frame` is not exactly [`FRAME_LEN`] bytes.
pub fn encode_response(frame: &[u8], reward: f32, done: bool) -> Result<Vec<u8>> {
    if frame.len() != FRAME_LEN {
        return Err(Error::protocol(format!(
            "frame length {} != {FRAME_LEN}",
            frame.len()
        )));
    }

    let mut out = Vec::with_capacity(RESPONSE_LEN);
    out.extend_from_slice(&SENTINEL_BYTES);
    out.extend_from_slice(frame);
    out.extend_from_slice(&reward.to_le_bytes());
    out.push(u8::from(done));
    Ok(out)
}

/// Copies a 4-byte field out of a slice already known to be 4 bytes long.
fn le_field(bytes: &[u8]) -> [u8; 4] {
    let mut field = [0u8; 4];
    field.copy_from_slice(bytes);
    field
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn gray_frame(value: u8) -> Vec<u8> {
        vec![value; FRAME_LEN]
    }

    #[test]
    fn test_encode_action_layout() {
        assert_eq!(encode_action(0x05), [0xEF, 0xBE, 0x37, 0x13, 0x05]);
    }

    #[test]
    fn test_decode_action_rejects_bad_sentinel() {
        let err = decode_action(&[0, 0, 0, 0, 3]).unwrap_err();
        assert!(matches!(err, Error::Desync { found: 0 }));
    }

    #[test]
    fn test_decode_done_strict() {
        assert!(decode_done(1, true).unwrap());
        assert!(!decode_done(0, true).unwrap());
        assert!(matches!(decode_done(2, true), Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_decode_done_lenient() {
        assert!(!decode_done(2, false).unwrap());
        assert!(!decode_done(0xFF, false).unwrap());
        assert!(decode_done(1, false).unwrap());
    }

    #[test]
    fn test_response_round_trip() {
        let bytes = encode_response(&gray_frame(128), 1.5, false).unwrap();
        assert_eq!(bytes.len(), RESPONSE_LEN);

        let response = decode_response(&bytes, true).unwrap();
        assert_eq!(response.reward, 1.5);
        assert!(!response.done);
        assert!(response.frame.as_bytes().iter().all(|&b| b == 128));
    }

    #[test]
    fn test_decode_response_checks_sentinel_first() {
        // Corrupt sentinel on an otherwise short buffer: desync wins over length
        let err = decode_response(&[1, 2, 3, 4, 5], true).unwrap_err();
        assert!(matches!(err, Error::Desync { found: 0x0403_0201 }));
    }

    #[test]
    fn test_decode_response_rejects_wrong_length() {
        let mut bytes = encode_response(&gray_frame(0), 0.0, true).unwrap();
        bytes.pop();
        assert!(matches!(
            decode_response(&bytes, true),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_encode_response_rejects_short_frame() {
        assert!(matches!(
            encode_response(&[0u8; 16], 0.0, false),
            Err(Error::Protocol { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_action_byte_survives_framing(code in any::<u8>()) {
            let message = encode_action(code);
            prop_assert_eq!(&message[..4], &SENTINEL_BYTES[..]);
            prop_assert_eq!(decode_action(&message).unwrap(), code);
        }

        #[test]
        fn prop_any_other_sentinel_is_desync(found in any::<u32>()) {
            prop_assume!(found != SENTINEL);
            let err = check_sentinel(found.to_le_bytes()).unwrap_err();
            let desync = matches!(err, Error::Desync { found: f } if f == found);
            prop_assert!(desync, "expected desync on {:#010x}", found);
        }

        #[test]
        fn prop_reward_bits_preserved(reward in any::<f32>()) {
            let decoded = decode_reward(reward.to_le_bytes());
            prop_assert_eq!(decoded.to_bits(), reward.to_bits());
        }
    }
}
