use crate::layout::Layout;
use crate::narration::NarrationState;
use crate::render::PageStatus;
use serde::Serialize;
use ts_rs::TS;

/// Serializable view of a session for the front end.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ReaderSnapshot {
    pub document: Option<DocumentSnapshot>,
    pub current_page: usize,
    pub page_count: usize,
    pub layout: Layout,
    pub narration: NarrationSnapshot,
    /// Render status of every page, index `i` being page `i + 1`.
    pub pages: Vec<PageStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct DocumentSnapshot {
    pub handle: String,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct NarrationSnapshot {
    pub state: NarrationState,
    pub page: usize,
    pub offset: usize,
}
