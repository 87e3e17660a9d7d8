//! Document identity and the document-source collaborator contract.

use crate::error::SourceError;
use crate::manifest::DocumentEntry;
use async_trait::async_trait;

/// What the source reports when a document is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Source-specific reference to one page of an opened document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHandle {
    /// 1-based page number.
    pub number: usize,
    /// Opaque locator understood by the source that produced the handle.
    pub locator: String,
}

/// Rasterizes pages and extracts their text (a PDF library in the browser
/// build, a folder of page images in [`crate::folder_source`]).
///
/// Calls are the engine's suspension points; they may take arbitrarily long
/// and the engine applies no timeout of its own.
#[async_trait(?Send)]
pub trait DocumentSource {
    async fn open(&self, handle: &str) -> Result<DocumentInfo, SourceError>;

    /// Resolve page `number` (1-based). Fails with `PageNotFound` when the
    /// number is out of range or the page cannot be read.
    async fn get_page(&self, handle: &str, number: usize) -> Result<PageHandle, SourceError>;

    /// Encoded image bytes for the page at `scale`.
    async fn rasterize(&self, page: &PageHandle, scale: f32) -> Result<Vec<u8>, SourceError>;

    async fn extract_text(&self, page: &PageHandle) -> Result<String, SourceError>;
}

/// The document currently owned by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub handle: String,
    pub title: String,
    pub author: String,
    page_count: usize,
    page_count_known: bool,
}

impl Document {
    pub fn new(handle: impl Into<String>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            title: title.into(),
            author: author.into(),
            page_count: 1,
            page_count_known: false,
        }
    }

    pub fn from_entry(entry: &DocumentEntry) -> Self {
        Self::new(&entry.handle, &entry.title, &entry.author)
    }

    /// 1 until the source has reported the real count.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn page_count_known(&self) -> bool {
        self.page_count_known
    }

    /// Record the page count reported on open. The count is fixed for the
    /// rest of the session; later calls are ignored and return `false`.
    pub fn settle(&mut self, info: &DocumentInfo) -> bool {
        if self.page_count_known {
            return false;
        }
        self.page_count = info.page_count.max(1);
        self.page_count_known = true;
        if self.title.is_empty() {
            if let Some(title) = &info.title {
                self.title = title.clone();
            }
        }
        if self.author.is_empty() {
            if let Some(author) = &info.author {
                self.author = author.clone();
            }
        }
        true
    }

    /// Clamp a requested page number into `[1, page_count]`.
    pub fn clamp_page(&self, page: usize) -> usize {
        page.clamp(1, self.page_count)
    }
}
