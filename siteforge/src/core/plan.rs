//! Typed stage outputs persisted for skip/resume reconstruction.
//!
//! Each stage's output is a distinct variant of [`StageData`]. The
//! orchestrator validates the variant when reconstructing a completed
//! stage's output instead of trusting an untyped blob.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ArtifactKind, StageId};
use crate::errors::GenerationError;

/// Token distribution summary rendered on the site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenomics {
    /// Total token supply, display form.
    pub total_supply: String,
    /// Distribution description.
    pub distribution: String,
}

/// Written site copy produced by analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteContent {
    /// Main headline.
    pub headline: String,
    /// Short tagline.
    pub tagline: String,
    /// About/description section.
    pub about: String,
    /// Feature bullet points.
    pub features: Vec<String>,
    /// Token distribution summary.
    pub tokenomics: Tokenomics,
}

/// One synthesis task requested by analysis.
///
/// Request order is significant: it fixes the `index` of the resulting
/// artifact for deterministic assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    /// Asset name, e.g. "logo" or "hero_background".
    pub name: String,
    /// Deliverable kind the generator should produce.
    pub kind: ArtifactKind,
    /// Generation prompt.
    pub prompt: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
}

impl AssetRequest {
    /// Creates an image asset request.
    #[must_use]
    pub fn image(
        name: impl Into<String>,
        prompt: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ArtifactKind::Image,
            prompt: prompt.into(),
            width,
            height,
        }
    }
}

/// Output of the analysis stage: site copy plus the synthesis plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Written site copy.
    pub content: SiteContent,
    /// Ordered synthesis tasks for the fan-out stage.
    pub asset_requests: Vec<AssetRequest>,
}

/// Output of the synthesis stage: produced artifact ids in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    /// Artifact ids, one per asset request, in request order.
    pub artifact_ids: Vec<Uuid>,
}

/// A published site handed back by the publish collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedSite {
    /// Public URL of the deployed site.
    pub url: String,
}

/// Output of the assembly stage: the bundle artifact and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyOutput {
    /// Artifact id of the assembled site bundle.
    pub bundle_artifact_id: Uuid,
    /// The published deployment.
    pub published: PublishedSite,
}

/// Tagged union of per-stage outputs, persisted alongside the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageData {
    /// Analysis output.
    Analysis(AnalysisOutput),
    /// Synthesis output.
    AssetSynthesis(SynthesisOutput),
    /// Assembly output.
    Assembly(AssemblyOutput),
}

impl StageData {
    /// The stage this output belongs to.
    #[must_use]
    pub fn stage(&self) -> StageId {
        match self {
            Self::Analysis(_) => StageId::Analysis,
            Self::AssetSynthesis(_) => StageId::AssetSynthesis,
            Self::Assembly(_) => StageId::Assembly,
        }
    }

    /// Extracts the analysis variant, or fails with a mismatch error.
    pub fn expect_analysis(&self) -> Result<&AnalysisOutput, GenerationError> {
        match self {
            Self::Analysis(out) => Ok(out),
            other => Err(mismatch(StageId::Analysis, other)),
        }
    }

    /// Extracts the synthesis variant, or fails with a mismatch error.
    pub fn expect_synthesis(&self) -> Result<&SynthesisOutput, GenerationError> {
        match self {
            Self::AssetSynthesis(out) => Ok(out),
            other => Err(mismatch(StageId::AssetSynthesis, other)),
        }
    }

    /// Extracts the assembly variant, or fails with a mismatch error.
    pub fn expect_assembly(&self) -> Result<&AssemblyOutput, GenerationError> {
        match self {
            Self::Assembly(out) => Ok(out),
            other => Err(mismatch(StageId::Assembly, other)),
        }
    }
}

fn mismatch(expected: StageId, found: &StageData) -> GenerationError {
    GenerationError::StageDataMismatch {
        stage: expected,
        message: format!("found output for {}", found.stage()),
    }
}
