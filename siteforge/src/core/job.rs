//! Job records: one per site-generation request.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::utils::{generate_uuid, now_utc, Timestamp};

/// Lifecycle status of a job. Mutated only by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, not yet picked up by a pipeline run.
    Draft,
    /// A pipeline run is active for this job.
    Generating,
    /// The pipeline finished all stages.
    Completed,
    /// The last pipeline run exhausted retries on some stage.
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Free-form user input captured at submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    /// Project name, e.g. "MoonCat".
    pub name: String,
    /// Free-form project description.
    pub description: String,
    /// Short ticker code, e.g. "MCAT".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    /// Optional reference image URL to steer asset generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,
}

impl JobInput {
    /// Creates an input from the two required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ticker: None,
            reference_image_url: None,
        }
    }

    /// Sets the ticker code.
    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    /// Sets the reference image URL.
    #[must_use]
    pub fn with_reference_image(mut self, url: impl Into<String>) -> Self {
        self.reference_image_url = Some(url.into());
        self
    }

    /// Checks the required fields are present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.description.trim().is_empty()
    }
}

/// One site-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// Project name (denormalized from input for listing views).
    pub name: String,
    /// The submitted input.
    pub input: JobInput,
    /// Lifecycle status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub created_at: Timestamp,
    /// Last status change.
    pub updated_at: Timestamp,
}

impl Job {
    /// Creates a new draft job from submitted input.
    #[must_use]
    pub fn new(owner_id: Uuid, input: JobInput) -> Self {
        let now = now_utc();
        Self {
            id: generate_uuid(),
            owner_id,
            name: input.name.clone(),
            input,
            status: JobStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_job_is_draft() {
        let input = JobInput::new("MoonCat", "a cat coin").with_ticker("MCAT");
        let job = Job::new(Uuid::new_v4(), input);
        assert_eq!(job.status, JobStatus::Draft);
        assert_eq!(job.name, "MoonCat");
        assert_eq!(job.input.ticker.as_deref(), Some("MCAT"));
    }

    #[test]
    fn test_input_validation() {
        assert!(JobInput::new("X", "d").is_valid());
        assert!(!JobInput::new("", "d").is_valid());
        assert!(!JobInput::new("X", "   ").is_valid());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&JobStatus::Generating).unwrap();
        assert_eq!(json, "\"generating\"");
    }
}
