//! Per-job checkpoint: which stages finished, where to resume.
//!
//! The checkpoint is read once at orchestration start and written after
//! every stage attempt. A stage enters `completed_modules` only after its
//! artifacts are durably persisted; partial stage work is never marked
//! complete. The set is monotonically non-decreasing except via an
//! explicit [`ModuleProgress::reset`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::StageId;
use crate::errors::GenerationError;

/// Durable resume record for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProgress {
    /// Completed stages in pipeline order.
    pub completed_modules: Vec<StageId>,
    /// The stage the last run failed on, if any.
    pub failed_module: Option<StageId>,
    /// How many runs have failed a stage since the last reset.
    pub retry_count: u32,
}

impl ModuleProgress {
    /// Creates an empty checkpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the stage already completed.
    #[must_use]
    pub fn is_completed(&self, stage: StageId) -> bool {
        self.completed_modules.contains(&stage)
    }

    /// Adds a completed stage. Idempotent and additive only; clears the
    /// failure marker since the resume point has moved past it.
    pub fn mark_completed(&mut self, stage: StageId) {
        if !self.is_completed(stage) {
            self.completed_modules.push(stage);
        }
        self.failed_module = None;
    }

    /// Records the failing stage as the resume point.
    pub fn mark_failed(&mut self, stage: StageId) {
        self.failed_module = Some(stage);
        self.retry_count += 1;
    }

    /// Clears all progress for an explicit full re-run. Never automatic.
    pub fn reset(&mut self) {
        self.completed_modules.clear();
        self.failed_module = None;
        self.retry_count = 0;
    }
}

/// Durable storage for per-job checkpoints.
///
/// Implementations must tolerate concurrent writes from unrelated jobs
/// via record-scoped locking.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint for a job; empty if none exists yet.
    async fn load(&self, job_id: Uuid) -> Result<ModuleProgress, GenerationError>;

    /// Appends a completed stage. Idempotent.
    async fn mark_completed(&self, job_id: Uuid, stage: StageId) -> Result<(), GenerationError>;

    /// Records the failing stage and bumps the retry counter.
    async fn mark_failed(&self, job_id: Uuid, stage: StageId) -> Result<(), GenerationError>;

    /// Clears the checkpoint for an explicit full re-run.
    async fn reset(&self, job_id: Uuid) -> Result<(), GenerationError>;
}
