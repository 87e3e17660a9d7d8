//! Document source backed by a directory of page images.
//!
//! A document handle is a directory path. Every `png`, `jpg`, `jpeg` or `webp`
//! file in it is one page, ordered by natural file-name order (`page2` before
//! `page10`). A `<stem>.txt` file next to a page image holds that page's text;
//! an optional `document.toml` supplies `title` and `author`.

use crate::document::{DocumentInfo, DocumentSource, PageHandle};
use crate::error::SourceError;
use async_trait::async_trait;
use image::imageops::FilterType;
use serde::Deserialize;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];
const METADATA_FILE: &str = "document.toml";

#[derive(Debug, Default, Deserialize)]
struct FolderMetadata {
    title: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Default)]
pub struct FolderDocumentSource {
    pages: RefCell<HashMap<String, Vec<PathBuf>>>,
}

impl FolderDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn page_paths(&self, handle: &str) -> Result<Vec<PathBuf>, SourceError> {
        if let Some(paths) = self.pages.borrow().get(handle) {
            return Ok(paths.clone());
        }
        let paths = list_pages(Path::new(handle)).await?;
        self.pages
            .borrow_mut()
            .insert(handle.to_string(), paths.clone());
        Ok(paths)
    }
}

#[async_trait(?Send)]
impl DocumentSource for FolderDocumentSource {
    async fn open(&self, handle: &str) -> Result<DocumentInfo, SourceError> {
        // Re-list on every open so edits to the folder are picked up.
        self.pages.borrow_mut().remove(handle);
        let paths = self.page_paths(handle).await?;
        let metadata = read_metadata(Path::new(handle)).await;
        debug!(handle, pages = paths.len(), "Opened folder document");
        Ok(DocumentInfo {
            page_count: paths.len(),
            title: metadata.title,
            author: metadata.author,
        })
    }

    async fn get_page(&self, handle: &str, number: usize) -> Result<PageHandle, SourceError> {
        let paths = self.page_paths(handle).await?;
        let path = number
            .checked_sub(1)
            .and_then(|index| paths.get(index))
            .ok_or(SourceError::PageNotFound(number))?;
        Ok(PageHandle {
            number,
            locator: path.to_string_lossy().into_owned(),
        })
    }

    async fn rasterize(&self, page: &PageHandle, scale: f32) -> Result<Vec<u8>, SourceError> {
        let path = PathBuf::from(&page.locator);
        let scale = scale.clamp(0.05, 8.0);
        tokio::task::spawn_blocking(move || rasterize_file(&path, scale))
            .await
            .map_err(|err| SourceError::Malformed(format!("render task failed: {err}")))?
    }

    async fn extract_text(&self, page: &PageHandle) -> Result<String, SourceError> {
        let sidecar = Path::new(&page.locator).with_extension("txt");
        match tokio::fs::read_to_string(&sidecar).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }
}

async fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_page = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_page && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(paths)
}

async fn read_metadata(dir: &Path) -> FolderMetadata {
    let path = dir.join(METADATA_FILE);
    let Ok(contents) = tokio::fs::read_to_string(&path).await else {
        return FolderMetadata::default();
    };
    match toml::from_str(&contents) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!(path = %path.display(), "Ignoring unreadable document metadata: {err}");
            FolderMetadata::default()
        }
    }
}

fn rasterize_file(path: &Path, scale: f32) -> Result<Vec<u8>, SourceError> {
    let image = image::open(path)?;
    let image = if (scale - 1.0).abs() > f32::EPSILON {
        let width = ((image.width() as f32 * scale).round() as u32).max(1);
        let height = ((image.height() as f32 * scale).round() as u32).max(1);
        image.resize_exact(width, height, FilterType::Triangle)
    } else {
        image
    };
    let mut output = Vec::new();
    image.write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)?;
    Ok(output)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Compare file names so embedded numbers sort by value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (is_number(x), is_number(y)) {
                    (true, true) => {
                        let x = x.trim_start_matches('0');
                        let y = y.trim_start_matches('0');
                        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
                    }
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn is_number(chunk: &str) -> bool {
    chunk.starts_with(|ch: char| ch.is_ascii_digit())
}

/// Split into maximal runs of ASCII digits and non-digits.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, ch)| ch.is_ascii_digit() != digits)
            .map_or(rest.len(), |(idx, _)| idx);
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}
