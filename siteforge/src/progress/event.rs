//! Progress event payloads.

use serde::{Deserialize, Serialize};

use crate::core::StageId;

/// An ephemeral progress update. Never persisted; lost if no listener is
/// attached at emission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Overall completion, 0-100.
    pub percentage: u8,
    /// Human-readable status line.
    pub message: String,
    /// The stage the event refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StageId>,
    /// Error description for terminal failure events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    /// Creates a progress event for a stage.
    #[must_use]
    pub fn step(percentage: u8, message: impl Into<String>, step: StageId) -> Self {
        Self {
            percentage: percentage.min(100),
            message: message.into(),
            step: Some(step),
            error: None,
        }
    }

    /// Creates an event without a stage reference.
    #[must_use]
    pub fn message(percentage: u8, message: impl Into<String>) -> Self {
        Self {
            percentage: percentage.min(100),
            message: message.into(),
            step: None,
            error: None,
        }
    }

    /// Creates a terminal error event.
    #[must_use]
    pub fn error(message: impl Into<String>, step: Option<StageId>, error: impl Into<String>) -> Self {
        Self {
            percentage: 100,
            message: message.into(),
            step,
            error: Some(error.into()),
        }
    }
}

/// What a listener receives: events, then a terminal closed marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// A progress event.
    Event(ProgressEvent),
    /// Terminal marker: no further events will arrive for this job.
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_clamped() {
        let event = ProgressEvent::message(250, "overflow");
        assert_eq!(event.percentage, 100);
    }

    #[test]
    fn test_error_event_is_terminal_shaped() {
        let event = ProgressEvent::error("generation failed", Some(StageId::AssetSynthesis), "timeout");
        assert_eq!(event.percentage, 100);
        assert_eq!(event.error.as_deref(), Some("timeout"));
        assert_eq!(event.step, Some(StageId::AssetSynthesis));
    }
}
