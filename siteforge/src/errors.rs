//! Error taxonomy for the generation pipeline.
//!
//! Errors are classified by how the orchestrator should react: transient
//! executor failures are retried, invalid input fails fast, and storage
//! failures hard-fail the whole attempt so the checkpoint never drifts
//! from what is actually persisted.

use thiserror::Error;

use crate::core::StageId;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A transient executor failure (network, rate limit, timeout).
    /// Eligible for retry under the stage retry policy.
    #[error("executor failure in {stage}: {message}")]
    ExecutorTransient {
        /// The stage whose executor failed.
        stage: StageId,
        /// Human-readable cause.
        message: String,
    },

    /// Malformed or missing required input. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persistence failure while writing a checkpoint, attempt, or
    /// artifact. Hard-fails the attempt: continuing would desynchronize
    /// the checkpoint from reality.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The checkpoint claims a stage completed, but its persisted output
    /// is missing or carries the wrong variant.
    #[error("persisted data for {stage} is missing or has the wrong shape: {message}")]
    StageDataMismatch {
        /// The stage whose output failed reconstruction.
        stage: StageId,
        /// What was found instead.
        message: String,
    },

    /// Serialization/deserialization error at a persistence boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GenerationError {
    /// Convenience constructor for transient executor failures.
    pub fn transient(stage: StageId, message: impl Into<String>) -> Self {
        Self::ExecutorTransient {
            stage,
            message: message.into(),
        }
    }

    /// Returns true if the retry policy may re-invoke the failed operation.
    ///
    /// Invalid input and persistence failures never consume retry budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutorTransient { .. })
    }
}
