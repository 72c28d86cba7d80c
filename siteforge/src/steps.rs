//! Ordered, named step list persisted on the generation attempt.
//!
//! Updates are pure: [`update_step`] returns a new list, and the
//! orchestrator persists the returned snapshot after every transition, so
//! the record stays consistent with the last completed action even across
//! a crash.

use serde::{Deserialize, Serialize};

use crate::core::StageId;
use crate::utils::{now_utc, Timestamp};

/// Display status of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started.
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Exhausted retries.
    Failed,
}

/// One entry in the step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    /// The stage this step tracks.
    pub id: StageId,
    /// Human-readable label.
    pub label: String,
    /// Current status.
    pub status: StepStatus,
    /// When the step entered `InProgress`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the step reached `Completed` or `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

/// A partial update applied to one step.
#[derive(Debug, Clone, Default)]
pub struct StepPatch {
    status: Option<StepStatus>,
}

impl StepPatch {
    /// Patch that moves a step to `InProgress` and stamps its start.
    #[must_use]
    pub fn in_progress() -> Self {
        Self {
            status: Some(StepStatus::InProgress),
        }
    }

    /// Patch that moves a step to `Completed` and stamps its end.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            status: Some(StepStatus::Completed),
        }
    }

    /// Patch that moves a step to `Failed` and stamps its end.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            status: Some(StepStatus::Failed),
        }
    }
}

/// Builds the initial step list, one pending entry per stage in pipeline
/// order.
#[must_use]
pub fn init_steps() -> Vec<StepState> {
    StageId::ALL
        .iter()
        .map(|&id| StepState {
            id,
            label: id.label().to_string(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
        })
        .collect()
}

/// Applies a patch to the step with the given id, returning a new list.
///
/// Steps other than the target are untouched. An unknown id returns the
/// list unchanged.
#[must_use]
pub fn update_step(steps: &[StepState], id: StageId, patch: &StepPatch) -> Vec<StepState> {
    steps
        .iter()
        .map(|step| {
            if step.id != id {
                return step.clone();
            }
            let mut updated = step.clone();
            if let Some(status) = patch.status {
                updated.status = status;
                match status {
                    StepStatus::InProgress => updated.started_at = Some(now_utc()),
                    StepStatus::Completed | StepStatus::Failed => {
                        updated.finished_at = Some(now_utc());
                    }
                    StepStatus::Pending => {}
                }
            }
            updated
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_steps_order_and_status() {
        let steps = init_steps();
        assert_eq!(steps.len(), StageId::ALL.len());
        for (step, &stage) in steps.iter().zip(StageId::ALL.iter()) {
            assert_eq!(step.id, stage);
            assert_eq!(step.status, StepStatus::Pending);
            assert!(step.started_at.is_none());
        }
    }

    #[test]
    fn test_update_is_pure() {
        let steps = init_steps();
        let updated = update_step(&steps, StageId::Analysis, &StepPatch::in_progress());

        assert_eq!(steps[0].status, StepStatus::Pending);
        assert_eq!(updated[0].status, StepStatus::InProgress);
        assert!(updated[0].started_at.is_some());
    }

    #[test]
    fn test_update_only_touches_target() {
        let steps = init_steps();
        let updated = update_step(&steps, StageId::AssetSynthesis, &StepPatch::failed());

        assert_eq!(updated[0], steps[0]);
        assert_eq!(updated[1].status, StepStatus::Failed);
        assert!(updated[1].finished_at.is_some());
        assert_eq!(updated[2], steps[2]);
    }

    #[test]
    fn test_completed_stamps_finish() {
        let steps = init_steps();
        let steps = update_step(&steps, StageId::Analysis, &StepPatch::in_progress());
        let steps = update_step(&steps, StageId::Analysis, &StepPatch::completed());

        assert_eq!(steps[0].status, StepStatus::Completed);
        assert!(steps[0].started_at.is_some());
        assert!(steps[0].finished_at.is_some());
    }
}
