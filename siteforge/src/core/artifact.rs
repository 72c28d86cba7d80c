//! Artifact records: one persisted deliverable per unit of work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StageId;
use crate::utils::{generate_uuid, now_utc, Timestamp};

/// What kind of deliverable an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A generated image (logo, banner, icon).
    Image,
    /// A text/HTML document (site content, assembled page).
    Document,
    /// A structured JSON blob (analysis plan, site manifest).
    Blob,
}

/// Where the artifact's content lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactContent {
    /// Content stored inline on the record.
    Inline {
        /// The inline payload.
        data: serde_json::Value,
    },
    /// Content stored externally, referenced by URL.
    StorageRef {
        /// The storage URL.
        url: String,
    },
}

/// The executor-side payload for a freshly produced deliverable.
///
/// Executors return these; the orchestrator assigns identity, stage tag,
/// and request-order index before persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArtifact {
    /// Deliverable kind.
    pub kind: ArtifactKind,
    /// Human-readable name, e.g. "logo" or "x_banner".
    pub name: String,
    /// The produced content.
    pub content: ArtifactContent,
}

impl NewArtifact {
    /// Creates an artifact payload with inline content.
    #[must_use]
    pub fn inline(kind: ArtifactKind, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            name: name.into(),
            content: ArtifactContent::Inline { data },
        }
    }

    /// Creates an artifact payload referencing external storage.
    #[must_use]
    pub fn storage_ref(kind: ArtifactKind, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            content: ArtifactContent::StorageRef { url: url.into() },
        }
    }
}

/// One persisted deliverable produced by a stage.
///
/// Written the instant its unit of work succeeds, never batched at stage
/// end. `index` is the request-order position within the stage, which
/// keeps later assembly deterministic regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier.
    pub id: Uuid,
    /// The owning job.
    pub job_id: Uuid,
    /// The stage that produced it.
    pub stage: StageId,
    /// Request-order position within the stage.
    pub index: usize,
    /// Deliverable kind.
    pub kind: ArtifactKind,
    /// Human-readable name.
    pub name: String,
    /// Inline content or storage reference.
    pub content: ArtifactContent,
    /// When the artifact was persisted.
    pub created_at: Timestamp,
}

impl Artifact {
    /// Materializes an executor payload into a persistable record.
    #[must_use]
    pub fn from_new(job_id: Uuid, stage: StageId, index: usize, new: NewArtifact) -> Self {
        Self {
            id: generate_uuid(),
            job_id,
            stage,
            index,
            kind: new.kind,
            name: new.name,
            content: new.content,
            created_at: now_utc(),
        }
    }
}
