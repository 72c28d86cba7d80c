//! Mock executors for testing pipelines without real generation services.

mod mocks;

pub use mocks::{plan_with_assets, MockAnalysis, MockAssembly, MockAssetGenerator, MockPublisher};
