//! Action codes.
//!
//! An action travels as one byte holding up to five independent controls.
//! Callers may address it either as a [`Controls`] bitmask or as a flat index
//! over the 32 combinations; the byte on the wire is the same. A session picks
//! one [`ActionEncoding`] and keeps it for its whole lifetime.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::ACTION_COUNT;

// ============================================================================
// Controls
// ============================================================================

bitflags! {
    /// Packed set of the five binary controls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Controls: u8 {
        /// Move up.
        const UP = 0b0000_0001;
        /// Move down.
        const DOWN = 0b0000_0010;
        /// Move left.
        const LEFT = 0b0000_0100;
        /// Move right.
        const RIGHT = 0b0000_1000;
        /// Slow, precise movement.
        const FOCUS = 0b0001_0000;
    }
}

impl Controls {
    /// Packs per-control flags in `[up, down, left, right, focus]` order.
    #[must_use]
    pub fn from_flags(flags: [bool; 5]) -> Self {
        const ORDER: [Controls; 5] = [
            Controls::UP,
            Controls::DOWN,
            Controls::LEFT,
            Controls::RIGHT,
            Controls::FOCUS,
        ];
        ORDER
            .into_iter()
            .zip(flags)
            .filter(|&(_, held)| held)
            .fold(Self::empty(), |acc, (control, _)| acc | control)
    }
}

impl fmt::Display for Controls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }

        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

// ============================================================================
// ActionEncoding
// ============================================================================

/// How a session interprets the actions it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionEncoding {
    /// Flat discrete index in `0..32`.
    #[default]
    FlatIndex,
    /// [`Controls`] bitmask.
    Bitmask,
}

impl ActionEncoding {
    /// Returns the action that holds no controls under this encoding.
    #[inline]
    #[must_use]
    pub const fn noop(self) -> Action {
        match self {
            Self::FlatIndex => Action::Index(0),
            Self::Bitmask => Action::Controls(Controls::empty()),
        }
    }

    /// Returns the wire code for `action`, rejecting actions of the other
    /// encoding and indices outside the action space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the action does not belong to
    /// this encoding or is out of range.
    pub fn encode(self, action: Action) -> Result<u8> {
        match (self, action) {
            (Self::FlatIndex, Action::Index(index)) => {
                if usize::from(index) < ACTION_COUNT {
                    Ok(index)
                } else {
                    Err(Error::invalid_argument(format!(
                        "action index {index} out of range 0..{ACTION_COUNT}"
                    )))
                }
            }
            (Self::Bitmask, Action::Controls(controls)) => Ok(controls.bits()),
            (encoding, action) => Err(Error::invalid_argument(format!(
                "action {action} does not match session encoding {encoding:?}"
            ))),
        }
    }
}

// ============================================================================
// Action
// ============================================================================

/// One action as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Flat discrete index over the 32 control combinations.
    Index(u8),
    /// Explicit control bitmask.
    Controls(Controls),
}

impl From<u8> for Action {
    fn from(index: u8) -> Self {
        Self::Index(index)
    }
}

impl From<Controls> for Action {
    fn from(controls: Controls) -> Self {
        Self::Controls(controls)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Controls(controls) => write!(f, "{controls}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
