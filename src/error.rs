//! Error types.
//!
//! Collaborator failures (`SourceError`, `SpeechError`) are caught where the
//! collaborator is called and translated into `ReaderError` or a `Notice`; they
//! never propagate past the component that made the call.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// Failure reported by a document source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Page out of range, or the document is malformed at that page.
    #[error("Page not found: {0}")]
    PageNotFound(usize),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// The request belongs to a session that has since been closed.
    #[error("Request cancelled at stage={0}")]
    Cancelled(&'static str),
}

/// Failure reported by a speech engine.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech request rejected: {0}")]
    Rejected(String),

    #[error("Voice not available: {0}")]
    VoiceUnavailable(String),
}

/// Errors surfaced by the reader engine.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The document or manifest source could not be opened or listed.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single page failed to rasterize; other pages are unaffected.
    #[error("Page {page} failed to render: {reason}")]
    PageRenderFailed { page: usize, reason: String },

    #[error("Speech synthesis is not supported")]
    SpeechUnsupported,
}

pub type Result<T> = std::result::Result<T, ReaderError>;

/// Transient user-facing notification. None of these stop the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum Notice {
    PageRenderFailed { page: usize, reason: String },
    /// The page has no extractable text; narration stays idle.
    NothingToRead { page: usize },
    SpeechUnsupported,
    SpeechFailed { reason: String },
}
