//! Page-flip document reader engine.
//!
//! Opens a paged document through a [`document::DocumentSource`], renders
//! pages progressively into a per-session cache, drives a page-turn animator
//! and narrates pages through a speech engine. Everything runs on one logical
//! thread; see [`runtime::ReaderRuntime`].

pub mod animator;
pub mod cancellation;
pub mod config;
pub mod debounce;
pub mod document;
pub mod error;
pub mod folder_source;
pub mod layout;
pub mod manifest;
pub mod narration;
pub mod render;
pub mod runtime;
pub mod session;
pub mod speech;
pub mod text_cache;

#[cfg(test)]
mod test_support;

pub use error::{Notice, ReaderError, Result};
pub use runtime::ReaderRuntime;
pub use session::{ReaderSession, ReaderSnapshot};
