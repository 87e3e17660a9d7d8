//! Document catalogue, grouped by category.
//!
//! The catalogue is a JSON array of `{ "category", "documents": [...] }`
//! objects. Order is significant and preserved.

use crate::error::{ReaderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category: String,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalogue {
    pub categories: Vec<Category>,
}

impl Catalogue {
    pub fn parse(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn find(&self, handle: &str) -> Option<&DocumentEntry> {
        self.documents().find(|entry| entry.handle == handle)
    }

    /// All entries in catalogue order.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.categories
            .iter()
            .flat_map(|category| category.documents.iter())
    }

    pub fn len(&self) -> usize {
        self.documents().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait(?Send)]
pub trait ManifestSource {
    async fn list(&self) -> Result<Catalogue>;
}

/// Catalogue stored as a JSON file on disk.
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait(?Send)]
impl ManifestSource for FileManifestSource {
    async fn list(&self) -> Result<Catalogue> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            warn!(path = %self.path.display(), "Failed to read catalogue: {err}");
            ReaderError::SourceUnavailable(format!("{}: {err}", self.path.display()))
        })?;
        let catalogue = Catalogue::parse(&data).map_err(|err| {
            warn!(path = %self.path.display(), "Invalid catalogue JSON: {err}");
            ReaderError::SourceUnavailable(format!("{}: {err}", self.path.display()))
        })?;
        info!(
            path = %self.path.display(),
            categories = catalogue.categories.len(),
            documents = catalogue.len(),
            "Loaded catalogue"
        );
        Ok(catalogue)
    }
}

/// Catalogue served over HTTP, as the browser build fetches it.
pub struct HttpManifestSource {
    url: String,
    client: reqwest::Client,
}

impl HttpManifestSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait(?Send)]
impl ManifestSource for HttpManifestSource {
    async fn list(&self) -> Result<Catalogue> {
        debug!(url = %self.url, "Fetching catalogue");
        let unavailable = |err: reqwest::Error| {
            warn!(url = %self.url, "Catalogue request failed: {err}");
            ReaderError::SourceUnavailable(format!("{}: {err}", self.url))
        };
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)?;
        let catalogue = Catalogue::parse(&body).map_err(|err| {
            warn!(url = %self.url, "Invalid catalogue JSON: {err}");
            ReaderError::SourceUnavailable(format!("{}: {err}", self.url))
        })?;
        info!(url = %self.url, documents = catalogue.len(), "Loaded catalogue");
        Ok(catalogue)
    }
}
