//! Generation attempt records: one per orchestration run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::steps::StepState;
use crate::utils::{generate_uuid, now_utc, Timestamp};

/// Overall status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The run is in progress.
    Running,
    /// The run finished all stages.
    Completed,
    /// The run exhausted retries on some stage.
    Failed,
}

impl AttemptStatus {
    /// Returns true once the attempt can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One full pipeline run for a job. Immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// Attempt identifier.
    pub id: Uuid,
    /// The job this run belongs to.
    pub job_id: Uuid,
    /// Overall status.
    pub status: AttemptStatus,
    /// Snapshot of per-step progress, updated after every transition.
    pub steps: Vec<StepState>,
    /// Terminal error if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

impl GenerationAttempt {
    /// Creates a running attempt for a job.
    #[must_use]
    pub fn new(job_id: Uuid, steps: Vec<StepState>) -> Self {
        Self {
            id: generate_uuid(),
            job_id,
            status: AttemptStatus::Running,
            steps,
            error: None,
            started_at: now_utc(),
            finished_at: None,
        }
    }

    /// Marks the attempt completed.
    pub fn complete(&mut self) {
        self.status = AttemptStatus::Completed;
        self.finished_at = Some(now_utc());
    }

    /// Marks the attempt failed with the causing error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = AttemptStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(now_utc());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::init_steps;

    #[test]
    fn test_new_attempt_is_running() {
        let attempt = GenerationAttempt::new(Uuid::new_v4(), init_steps());
        assert_eq!(attempt.status, AttemptStatus::Running);
        assert!(attempt.finished_at.is_none());
        assert_eq!(attempt.steps.len(), 3);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!AttemptStatus::Running.is_terminal());
        assert!(AttemptStatus::Completed.is_terminal());
        assert!(AttemptStatus::Failed.is_terminal());
    }

    #[test]
    fn test_fail_records_error_and_end() {
        let mut attempt = GenerationAttempt::new(Uuid::new_v4(), init_steps());
        attempt.fail("synthesis exhausted retries");
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.error.as_deref(), Some("synthesis exhausted retries"));
        assert!(attempt.finished_at.is_some());
    }
}
