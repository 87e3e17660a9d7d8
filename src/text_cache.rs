//! Lazily populated page text for narration.
//!
//! Text is extracted at most once per page per session. Extracted text is
//! normalized before it is cached so narration offsets always refer to the
//! same string the speech engine receives.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\r?\n\s*(\p{Ll})").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// NFKC-fold (ligatures such as "ﬁ" become "fi"), join words hyphenated
/// across line breaks and collapse whitespace runs into single spaces.
pub fn normalize_page_text(raw: &str) -> String {
    let folded: String = raw.nfkc().filter(|ch| *ch != '\u{00AD}').collect();
    let joined = RE_HYPHEN_BREAK.replace_all(&folded, "$1$2");
    RE_WHITESPACE.replace_all(&joined, " ").trim().to_string()
}

/// Length in Unicode scalar values, the unit narration offsets use.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The suffix of `text` starting at character `offset` (empty past the end).
pub fn slice_from_char(text: &str, offset: usize) -> &str {
    match text.char_indices().nth(offset) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => "",
    }
}

#[derive(Debug, Default)]
pub struct TextCache {
    texts: HashMap<usize, String>,
    pending: HashSet<usize>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached text for `page`. An empty string means the page has no
    /// extractable text.
    pub fn get(&self, page: usize) -> Option<&str> {
        self.texts.get(&page).map(String::as_str)
    }

    pub fn contains(&self, page: usize) -> bool {
        self.texts.contains_key(&page)
    }

    pub fn is_pending(&self, page: usize) -> bool {
        self.pending.contains(&page)
    }

    /// Mark `page` as being extracted. Returns `false` when the text is
    /// already cached or an extraction is already in flight.
    pub fn begin(&mut self, page: usize) -> bool {
        if self.contains(page) {
            return false;
        }
        self.pending.insert(page)
    }

    pub fn insert(&mut self, page: usize, raw: &str) -> &str {
        self.pending.remove(&page);
        self.texts
            .entry(page)
            .or_insert_with(|| normalize_page_text(raw))
            .as_str()
    }

    /// Extraction failed; the page may be requested again later.
    pub fn abandon(&mut self, page: usize) {
        self.pending.remove(&page);
    }

    pub fn clear(&mut self) {
        self.texts.clear();
        self.pending.clear();
    }
}
