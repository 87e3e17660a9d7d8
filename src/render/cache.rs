//! Per-page artifact store for one open document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use ts_rs::TS;

/// Rendering quality; ordered so `Preview < Standard < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Quality {
    Preview,
    Standard,
    High,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Preview, Quality::Standard, Quality::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Preview => "preview",
            Quality::Standard => "standard",
            Quality::High => "high",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered page image. Cloning shares the image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifact {
    pub page: usize,
    pub quality: Quality,
    pub image: Arc<[u8]>,
}

impl PageArtifact {
    pub fn new(page: usize, quality: Quality, image: Vec<u8>) -> Self {
        Self {
            page,
            quality,
            image: image.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// An equal-quality artifact was replaced by a fresh render.
    Replaced,
    /// A better artifact is already resident; the new one was dropped.
    Kept,
}

impl StoreOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, StoreOutcome::Kept)
    }
}

/// Maps page number to its best resident artifact. Quality never decreases.
#[derive(Debug, Default)]
pub struct RenderCache {
    artifacts: BTreeMap<usize, PageArtifact>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: usize) -> Option<&PageArtifact> {
        self.artifacts.get(&page)
    }

    pub fn quality(&self, page: usize) -> Option<Quality> {
        self.artifacts.get(&page).map(|artifact| artifact.quality)
    }

    pub fn has_at_least(&self, page: usize, quality: Quality) -> bool {
        self.quality(page).is_some_and(|resident| resident >= quality)
    }

    pub fn store(&mut self, artifact: PageArtifact) -> StoreOutcome {
        match self.artifacts.get(&artifact.page) {
            Some(existing) if existing.quality > artifact.quality => StoreOutcome::Kept,
            Some(existing) if existing.quality == artifact.quality => {
                self.artifacts.insert(artifact.page, artifact);
                StoreOutcome::Replaced
            }
            _ => {
                self.artifacts.insert(artifact.page, artifact);
                StoreOutcome::Stored
            }
        }
    }

    /// Resident page numbers in ascending order.
    pub fn resident_pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.artifacts.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn clear(&mut self) {
        self.artifacts.clear();
    }
}
