//! Durable storage for jobs, attempts, artifacts, and stage outputs.
//!
//! The pipeline only talks to these traits. Implementations must tolerate
//! concurrent writes from unrelated jobs via record-scoped locking, and a
//! write failure anywhere here hard-fails the attempt that issued it.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::core::{Artifact, GenerationAttempt, Job, JobStatus, StageData, StageId};
use crate::errors::GenerationError;

/// Storage for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job.
    async fn insert_job(&self, job: Job) -> Result<(), GenerationError>;

    /// Fetches a job by id.
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, GenerationError>;

    /// Updates a job's lifecycle status.
    async fn update_job_status(&self, job_id: Uuid, status: JobStatus)
        -> Result<(), GenerationError>;
}

/// Storage for generation attempt records.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Inserts a new attempt.
    async fn insert_attempt(&self, attempt: GenerationAttempt) -> Result<(), GenerationError>;

    /// Overwrites an attempt record. Rejects updates once the stored
    /// attempt is terminal.
    async fn update_attempt(&self, attempt: GenerationAttempt) -> Result<(), GenerationError>;

    /// Fetches an attempt by id.
    async fn get_attempt(&self, attempt_id: Uuid)
        -> Result<Option<GenerationAttempt>, GenerationError>;

    /// Returns the most recently started attempt for a job.
    async fn latest_attempt(&self, job_id: Uuid)
        -> Result<Option<GenerationAttempt>, GenerationError>;
}

/// Storage for persisted artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persists one artifact the instant its unit of work succeeds.
    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), GenerationError>;

    /// Returns all artifacts for a job, ordered by stage then index.
    async fn artifacts_for_job(&self, job_id: Uuid) -> Result<Vec<Artifact>, GenerationError>;

    /// Returns a job's artifacts for one stage, ordered by index.
    async fn artifacts_for_stage(
        &self,
        job_id: Uuid,
        stage: StageId,
    ) -> Result<Vec<Artifact>, GenerationError>;
}

/// Storage for typed per-stage outputs used in skip/resume reconstruction.
#[async_trait]
pub trait StageOutputStore: Send + Sync {
    /// Saves a stage's typed output, replacing any prior value.
    async fn save_output(&self, job_id: Uuid, data: StageData) -> Result<(), GenerationError>;

    /// Loads a stage's typed output, if persisted.
    async fn load_output(
        &self,
        job_id: Uuid,
        stage: StageId,
    ) -> Result<Option<StageData>, GenerationError>;
}

/// Everything the orchestrator needs from durable storage.
pub trait Storage:
    JobStore + AttemptStore + ArtifactStore + StageOutputStore + CheckpointStore
{
}

impl<T> Storage for T where
    T: JobStore + AttemptStore + ArtifactStore + StageOutputStore + CheckpointStore
{
}
