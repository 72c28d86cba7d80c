//! Stage executor interfaces consumed by the orchestrator.
//!
//! Executors are external collaborators (LLM analysis, image synthesis,
//! site assembly, deployment). Each call must tolerate retry: a retried
//! invocation produces fresh output rather than assuming prior partial
//! state survived. Failures are reported as [`GenerationError`]; only
//! transient ones are retried.

use async_trait::async_trait;

use crate::core::{
    AnalysisOutput, Artifact, AssetRequest, Job, JobInput, NewArtifact, PublishedSite, SiteContent,
};
use crate::errors::GenerationError;

/// Analysis: one call turning the job input into a strategy/plan.
#[async_trait]
pub trait AnalysisExecutor: Send + Sync {
    /// Produces site copy and the ordered asset-synthesis plan.
    async fn analyze(&self, input: &JobInput) -> Result<AnalysisOutput, GenerationError>;
}

/// Asset synthesis: one independent generation task.
///
/// The orchestrator fans out N of these concurrently, one per
/// [`AssetRequest`] from analysis.
#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// Generates one asset for the given request.
    async fn generate(
        &self,
        input: &JobInput,
        request: &AssetRequest,
    ) -> Result<NewArtifact, GenerationError>;
}

/// Everything assembly needs to build the site bundle.
#[derive(Debug)]
pub struct AssemblyContext<'a> {
    /// The job being assembled.
    pub job: &'a Job,
    /// Site copy from analysis.
    pub content: &'a SiteContent,
    /// Synthesis artifacts in request order.
    pub assets: &'a [Artifact],
}

/// Assembly: combines artifacts into the final site bundle.
#[async_trait]
pub trait AssemblyExecutor: Send + Sync {
    /// Builds the deployable site bundle.
    async fn assemble(&self, ctx: AssemblyContext<'_>) -> Result<NewArtifact, GenerationError>;
}

/// Publish collaborator the assembly stage hands the bundle to.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deploys the persisted bundle and returns where it lives.
    async fn publish(
        &self,
        job: &Job,
        bundle: &Artifact,
    ) -> Result<PublishedSite, GenerationError>;
}
