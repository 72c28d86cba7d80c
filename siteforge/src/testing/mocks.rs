//! Scripted mock executors that record calls.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{
    AnalysisOutput, Artifact, ArtifactKind, AssetRequest, Job, JobInput, NewArtifact,
    PublishedSite, SiteContent, Tokenomics,
};
use crate::errors::GenerationError;
use crate::executors::{AnalysisExecutor, AssemblyContext, AssemblyExecutor, AssetGenerator, Publisher};

use crate::core::StageId;

/// Builds an analysis output requesting `n` image assets.
#[must_use]
pub fn plan_with_assets(n: usize) -> AnalysisOutput {
    AnalysisOutput {
        content: SiteContent {
            headline: "To the moon".into(),
            tagline: "The coin cats deserve".into(),
            about: "A community-driven token.".into(),
            features: vec!["Fair launch".into(), "Locked liquidity".into()],
            tokenomics: Tokenomics {
                total_supply: "1,000,000,000".into(),
                distribution: "100% community".into(),
            },
        },
        asset_requests: (0..n)
            .map(|i| AssetRequest::image(format!("asset_{i}"), format!("prompt {i}"), 512, 512))
            .collect(),
    }
}

/// A mock analysis executor with a scripted failure count.
pub struct MockAnalysis {
    output: AnalysisOutput,
    fail_first: Mutex<u32>,
    calls: Mutex<u32>,
}

impl MockAnalysis {
    /// Succeeds every call with the given plan.
    #[must_use]
    pub fn new(output: AnalysisOutput) -> Self {
        Self {
            output,
            fail_first: Mutex::new(0),
            calls: Mutex::new(0),
        }
    }

    /// Fails the first `n` calls with a transient error.
    #[must_use]
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = Mutex::new(n);
        self
    }

    /// Returns how many times `analyze` was invoked.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl AnalysisExecutor for MockAnalysis {
    async fn analyze(&self, _input: &JobInput) -> Result<AnalysisOutput, GenerationError> {
        *self.calls.lock() += 1;
        let mut remaining = self.fail_first.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(GenerationError::transient(StageId::Analysis, "model unavailable"));
        }
        Ok(self.output.clone())
    }
}

/// A mock asset generator with scripted per-call failures.
#[derive(Default)]
pub struct MockAssetGenerator {
    fail_always: bool,
    fail_first: Mutex<u32>,
    fail_asset: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockAssetGenerator {
    /// Succeeds every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call with a transient error.
    #[must_use]
    pub fn failing_always(mut self) -> Self {
        self.fail_always = true;
        self
    }

    /// Fails the first `n` calls (across all assets) with a transient error.
    #[must_use]
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = Mutex::new(n);
        self
    }

    /// Fails only the named asset, every time.
    #[must_use]
    pub fn failing_asset(mut self, name: impl Into<String>) -> Self {
        self.fail_asset = Some(name.into());
        self
    }

    /// Asset names in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Total number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AssetGenerator for MockAssetGenerator {
    async fn generate(
        &self,
        _input: &JobInput,
        request: &AssetRequest,
    ) -> Result<NewArtifact, GenerationError> {
        self.calls.lock().push(request.name.clone());

        let scripted_failure = {
            let mut remaining = self.fail_first.lock();
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        };

        if self.fail_always
            || scripted_failure
            || self.fail_asset.as_deref() == Some(request.name.as_str())
        {
            return Err(GenerationError::transient(
                StageId::AssetSynthesis,
                format!("generation failed for {}", request.name),
            ));
        }

        Ok(NewArtifact::storage_ref(
            request.kind,
            request.name.clone(),
            format!("s3://assets/{}.png", request.name),
        ))
    }
}

/// A mock assembly executor.
#[derive(Default)]
pub struct MockAssembly {
    fail_first: Mutex<u32>,
    calls: Mutex<u32>,
}

impl MockAssembly {
    /// Succeeds every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `n` calls with a transient error.
    #[must_use]
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = Mutex::new(n);
        self
    }

    /// Returns how many times `assemble` was invoked.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl AssemblyExecutor for MockAssembly {
    async fn assemble(&self, ctx: AssemblyContext<'_>) -> Result<NewArtifact, GenerationError> {
        *self.calls.lock() += 1;
        let mut remaining = self.fail_first.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(GenerationError::transient(StageId::Assembly, "bundler crashed"));
        }
        Ok(NewArtifact::inline(
            ArtifactKind::Document,
            "site_bundle",
            serde_json::json!({
                "headline": ctx.content.headline,
                "asset_count": ctx.assets.len(),
            }),
        ))
    }
}

/// A mock publisher returning a deterministic URL per job.
#[derive(Default)]
pub struct MockPublisher {
    calls: Mutex<u32>,
}

impl MockPublisher {
    /// Creates the mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times `publish` was invoked.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(
        &self,
        job: &Job,
        _bundle: &Artifact,
    ) -> Result<PublishedSite, GenerationError> {
        *self.calls.lock() += 1;
        Ok(PublishedSite {
            url: format!("https://sites.example/{}", job.id),
        })
    }
}
