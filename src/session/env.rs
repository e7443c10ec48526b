//! Environment contract consumed by training loops.
//!
//! A training loop only needs `reset` and `step`. Keeping them behind a
//! trait lets pools and wrappers hold `Box<dyn Environment>` without caring
//! which stream a session runs on.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::frame::Observation;
use crate::protocol::Action;

use super::core::Session;

// ============================================================================
// StepResult
// ============================================================================

/// Outcome of one successful exchange.
///
/// Either every field is valid or the step returned an error.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Decoded frame.
    pub observation: Observation,
    /// Reward reported by the peer for this tick.
    pub reward: f32,
    /// Episode-end flag reported by the peer.
    pub done: bool,
}

// ============================================================================
// Environment
// ============================================================================

/// Conventional reset/step simulation interface.
#[async_trait]
pub trait Environment: Send {
    /// Starts a new episode and returns its first observation.
    async fn reset(&mut self) -> Result<Observation>;

    /// Advances one tick with `action`.
    async fn step(&mut self, action: Action) -> Result<StepResult>;
}

#[async_trait]
impl<S> Environment for Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn reset(&mut self) -> Result<Observation> {
        Session::reset(self).await
    }

    async fn step(&mut self, action: Action) -> Result<StepResult> {
        Session::step(self, action).await
    }
}

// ============================================================================
// Tests
// ============================================================================
