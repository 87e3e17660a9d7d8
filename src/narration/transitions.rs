use super::{Lifecycle, NarrationAction, NarrationContext, NarrationController};
use crate::error::Notice;
use tracing::{debug, info, warn};

/// Callbacks narration reacts to. Speech events carry the token of the speak
/// request they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationEvent {
    Boundary { token: u64, char_index: usize },
    Ended { token: u64 },
    Failed { token: u64, reason: String },
    /// The settle delay after an automatic page turn has elapsed.
    Continue { token: u64, current_page: usize },
    /// The animator reported a new current page.
    PageChanged { page: usize },
    TextReady { page: usize },
    TextFailed { page: usize },
}

pub fn transition(
    narration: &mut NarrationController,
    event: NarrationEvent,
    ctx: NarrationContext<'_>,
) -> Vec<NarrationAction> {
    match event {
        NarrationEvent::Boundary { token, char_index } => {
            on_boundary(narration, token, char_index);
            Vec::new()
        }
        NarrationEvent::Ended { token } => on_ended(narration, token, ctx),
        NarrationEvent::Failed { token, reason } => on_failed(narration, token, reason),
        NarrationEvent::Continue {
            token,
            current_page,
        } => on_continue(narration, token, current_page, ctx),
        NarrationEvent::PageChanged { page } => on_page_changed(narration, page, ctx),
        NarrationEvent::TextReady { page } => on_text_ready(narration, page, ctx),
        NarrationEvent::TextFailed { page } => on_text_failed(narration, page),
    }
}

fn is_stale(narration: &NarrationController, token: u64) -> bool {
    if token != narration.token {
        debug!(token, current = narration.token, "Ignoring stale speech callback");
        return true;
    }
    false
}

fn on_boundary(narration: &mut NarrationController, token: u64, char_index: usize) {
    if is_stale(narration, token) {
        return;
    }
    if !matches!(narration.lifecycle, Lifecycle::Speaking | Lifecycle::Paused) {
        return;
    }
    narration.offset = narration.base_offset + char_index;
}

fn on_ended(
    narration: &mut NarrationController,
    token: u64,
    ctx: NarrationContext<'_>,
) -> Vec<NarrationAction> {
    if is_stale(narration, token) || narration.lifecycle != Lifecycle::Speaking {
        return Vec::new();
    }
    let mut actions = Vec::new();
    narration.finish_page(ctx, &mut actions);
    actions
}

fn on_failed(
    narration: &mut NarrationController,
    token: u64,
    reason: String,
) -> Vec<NarrationAction> {
    if is_stale(narration, token) {
        return Vec::new();
    }
    warn!(page = narration.page, token, "Speech failed: {reason}");
    narration.utterance = None;
    narration.lifecycle = Lifecycle::Idle;
    narration.offset = 0;
    narration.base_offset = 0;
    vec![NarrationAction::Notify(Notice::SpeechFailed { reason })]
}

fn on_continue(
    narration: &mut NarrationController,
    token: u64,
    current_page: usize,
    ctx: NarrationContext<'_>,
) -> Vec<NarrationAction> {
    if is_stale(narration, token) || narration.lifecycle != Lifecycle::Advancing {
        return Vec::new();
    }
    narration.start(current_page, 0, ctx)
}

/// Narration follows whatever page is current. A flip landing elsewhere
/// while speaking restarts on the new page; while paused the resume point
/// moves to the start of the new page.
fn on_page_changed(
    narration: &mut NarrationController,
    page: usize,
    ctx: NarrationContext<'_>,
) -> Vec<NarrationAction> {
    if page == narration.page {
        return Vec::new();
    }
    match narration.lifecycle {
        Lifecycle::Speaking | Lifecycle::Preparing => {
            info!(from = narration.page, to = page, "Page changed during narration; following");
            narration.start(page, 0, ctx)
        }
        Lifecycle::Paused => {
            let mut actions = Vec::new();
            narration.release(&mut actions);
            narration.token = narration.token.wrapping_add(1);
            narration.page = page;
            narration.offset = 0;
            narration.base_offset = 0;
            debug!(page, "Paused narration moved to new page");
            actions
        }
        Lifecycle::Idle | Lifecycle::Advancing => Vec::new(),
    }
}

fn on_text_ready(
    narration: &mut NarrationController,
    page: usize,
    ctx: NarrationContext<'_>,
) -> Vec<NarrationAction> {
    if narration.lifecycle != Lifecycle::Preparing || page != narration.page {
        return Vec::new();
    }
    let mut actions = Vec::new();
    narration.speak_current(ctx, &mut actions);
    actions
}

fn on_text_failed(narration: &mut NarrationController, page: usize) -> Vec<NarrationAction> {
    if narration.lifecycle != Lifecycle::Preparing || page != narration.page {
        return Vec::new();
    }
    warn!(page, "Text extraction failed; nothing to narrate");
    narration.lifecycle = Lifecycle::Idle;
    narration.offset = 0;
    narration.base_offset = 0;
    vec![NarrationAction::Notify(Notice::NothingToRead { page })]
}
