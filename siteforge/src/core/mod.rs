//! Core data model: jobs, attempts, artifacts, and stage identifiers.

mod artifact;
mod attempt;
mod job;
mod plan;
mod stage;

pub use artifact::{Artifact, ArtifactContent, ArtifactKind, NewArtifact};
pub use attempt::{AttemptStatus, GenerationAttempt};
pub use job::{Job, JobInput, JobStatus};
pub use plan::{
    AnalysisOutput, AssemblyOutput, AssetRequest, PublishedSite, SiteContent, StageData,
    SynthesisOutput, Tokenomics,
};
pub use stage::StageId;
