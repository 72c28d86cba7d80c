//! # Siteforge
//!
//! A resumable multi-stage generation pipeline for branded site launches.
//!
//! Siteforge turns a content request into a deployed artifact set through
//! a fixed sequence of stages, surviving partial failure without redoing
//! finished work:
//!
//! - **Checkpointed stages**: analysis, asset synthesis, assembly/publish;
//!   a completed stage is never re-invoked
//! - **Fan-out synthesis**: independent generation tasks run concurrently,
//!   each artifact persisted the moment it completes
//! - **Bounded retries**: exponential backoff with jitter around every
//!   stage invocation
//! - **Live progress**: ephemeral per-job event streams for any number of
//!   concurrent observers, with no replay
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use siteforge::prelude::*;
//!
//! let orchestrator = Orchestrator::new(store, analysis, assets, assembly, publisher);
//! let job = orchestrator.create_job(owner_id, JobInput::new("MoonCat", "a cat coin")).await?;
//!
//! let mut listener = orchestrator.broadcaster().open(job.id);
//! let result = orchestrator.run_pipeline(job.id, &job.input).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod checkpoint;
pub mod core;
pub mod errors;
pub mod executors;
pub mod observability;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod steps;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{CheckpointStore, ModuleProgress};
    pub use crate::core::{
        AnalysisOutput, Artifact, ArtifactContent, ArtifactKind, AssemblyOutput, AssetRequest,
        AttemptStatus, GenerationAttempt, Job, JobInput, JobStatus, NewArtifact, PublishedSite,
        SiteContent, StageData, StageId, SynthesisOutput,
    };
    pub use crate::errors::GenerationError;
    pub use crate::executors::{
        AnalysisExecutor, AssemblyContext, AssemblyExecutor, AssetGenerator, Publisher,
    };
    pub use crate::orchestrator::{GenerationResult, Orchestrator};
    pub use crate::progress::{
        ProgressBroadcaster, ProgressEvent, ProgressListener, ProgressUpdate,
    };
    pub use crate::retry::{with_retry, RetryPolicy};
    pub use crate::steps::{init_steps, update_step, StepPatch, StepState, StepStatus};
    pub use crate::store::{
        ArtifactStore, AttemptStore, JobStore, MemoryStore, StageOutputStore, Storage,
    };
    pub use crate::utils::{generate_uuid, now_utc, Timestamp};
}
