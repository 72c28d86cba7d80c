//! Stage identifiers and the fixed pipeline order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One named unit of the fixed pipeline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Single analysis call producing the site plan and asset requests.
    Analysis,
    /// Concurrent fan-out generating one artifact per asset request.
    AssetSynthesis,
    /// Combines artifacts into the site bundle and hands off to publish.
    Assembly,
}

impl StageId {
    /// The fixed execution order. Stage order is strict per job.
    pub const ALL: [Self; 3] = [Self::Analysis, Self::AssetSynthesis, Self::Assembly];

    /// Returns the stage's wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::AssetSynthesis => "asset_synthesis",
            Self::Assembly => "assembly",
        }
    }

    /// Returns the human-readable step label shown to observers.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Analysis => "Analyzing project",
            Self::AssetSynthesis => "Generating brand assets",
            Self::Assembly => "Assembling and publishing site",
        }
    }

    /// Zero-based position in the pipeline order.
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            Self::Analysis => 0,
            Self::AssetSynthesis => 1,
            Self::Assembly => 2,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
