//! In-memory store backed by concurrent maps.
//!
//! DashMap shards give record-scoped locking: writes for unrelated jobs
//! never contend on a global lock. Stage outputs are stored as JSON, the
//! same shape a database document column would hold.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ArtifactStore, AttemptStore, JobStore, StageOutputStore};
use crate::checkpoint::{CheckpointStore, ModuleProgress};
use crate::core::{Artifact, GenerationAttempt, Job, JobStatus, StageData, StageId};
use crate::errors::GenerationError;
use crate::utils::now_utc;

/// In-memory implementation of all pipeline storage traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: DashMap<Uuid, Job>,
    attempts: DashMap<Uuid, GenerationAttempt>,
    artifacts: DashMap<Uuid, Vec<Artifact>>,
    outputs: DashMap<(Uuid, StageId), serde_json::Value>,
    checkpoints: DashMap<Uuid, ModuleProgress>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<(), GenerationError> {
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, GenerationError> {
        Ok(self.jobs.get(&job_id).map(|j| j.value().clone()))
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
    ) -> Result<(), GenerationError> {
        let mut job = self
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| GenerationError::Storage(format!("unknown job {job_id}")))?;
        job.status = status;
        job.updated_at = now_utc();
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, attempt: GenerationAttempt) -> Result<(), GenerationError> {
        self.attempts.insert(attempt.id, attempt);
        Ok(())
    }

    async fn update_attempt(&self, attempt: GenerationAttempt) -> Result<(), GenerationError> {
        // The shard guard must drop before the insert below.
        let stored_terminal = self
            .attempts
            .get(&attempt.id)
            .map(|existing| existing.status.is_terminal());
        match stored_terminal {
            Some(true) => Err(GenerationError::Storage(format!(
                "attempt {} is terminal and immutable",
                attempt.id
            ))),
            Some(false) => {
                self.attempts.insert(attempt.id, attempt);
                Ok(())
            }
            None => Err(GenerationError::Storage(format!(
                "unknown attempt {}",
                attempt.id
            ))),
        }
    }

    async fn get_attempt(
        &self,
        attempt_id: Uuid,
    ) -> Result<Option<GenerationAttempt>, GenerationError> {
        Ok(self.attempts.get(&attempt_id).map(|a| a.value().clone()))
    }

    async fn latest_attempt(
        &self,
        job_id: Uuid,
    ) -> Result<Option<GenerationAttempt>, GenerationError> {
        Ok(self
            .attempts
            .iter()
            .filter(|a| a.job_id == job_id)
            .max_by_key(|a| a.started_at)
            .map(|a| a.value().clone()))
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), GenerationError> {
        self.artifacts.entry(artifact.job_id).or_default().push(artifact);
        Ok(())
    }

    async fn artifacts_for_job(&self, job_id: Uuid) -> Result<Vec<Artifact>, GenerationError> {
        let mut artifacts = self
            .artifacts
            .get(&job_id)
            .map(|v| v.value().clone())
            .unwrap_or_default();
        artifacts.sort_by_key(|a| (a.stage.position(), a.index));
        Ok(artifacts)
    }

    async fn artifacts_for_stage(
        &self,
        job_id: Uuid,
        stage: StageId,
    ) -> Result<Vec<Artifact>, GenerationError> {
        let mut artifacts: Vec<Artifact> = self
            .artifacts
            .get(&job_id)
            .map(|v| v.iter().filter(|a| a.stage == stage).cloned().collect())
            .unwrap_or_default();
        artifacts.sort_by_key(|a| a.index);
        Ok(artifacts)
    }
}

#[async_trait]
impl StageOutputStore for MemoryStore {
    async fn save_output(&self, job_id: Uuid, data: StageData) -> Result<(), GenerationError> {
        let value = serde_json::to_value(&data)?;
        self.outputs.insert((job_id, data.stage()), value);
        Ok(())
    }

    async fn load_output(
        &self,
        job_id: Uuid,
        stage: StageId,
    ) -> Result<Option<StageData>, GenerationError> {
        let value = self.outputs.get(&(job_id, stage)).map(|d| d.value().clone());
        match value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self, job_id: Uuid) -> Result<ModuleProgress, GenerationError> {
        Ok(self
            .checkpoints
            .get(&job_id)
            .map(|p| p.value().clone())
            .unwrap_or_default())
    }

    async fn mark_completed(
        &self,
        job_id: Uuid,
        stage: StageId,
    ) -> Result<(), GenerationError> {
        self.checkpoints
            .entry(job_id)
            .or_default()
            .mark_completed(stage);
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, stage: StageId) -> Result<(), GenerationError> {
        self.checkpoints.entry(job_id).or_default().mark_failed(stage);
        Ok(())
    }

    async fn reset(&self, job_id: Uuid) -> Result<(), GenerationError> {
        if let Some(mut progress) = self.checkpoints.get_mut(&job_id) {
            progress.reset();
        }
        Ok(())
    }
}
