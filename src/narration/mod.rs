//! Narration state machine.
//!
//! The controller never calls the speech engine or the document source. Every
//! command and every callback returns the [`NarrationAction`]s the session
//! must carry out, which keeps each transition testable without collaborators.

mod transitions;

pub use transitions::{NarrationEvent, transition};

use crate::config::NarrationConfig;
use crate::error::Notice;
use crate::speech::{SpeechOptions, UtteranceId};
use crate::text_cache::{TextCache, char_len, slice_from_char};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use ts_rs::TS;

/// Externally visible narration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NarrationState {
    Idle,
    Speaking,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Idle,
    /// Waiting for page text before the first speak request.
    Preparing,
    Speaking,
    Paused,
    /// Utterance ended; page flip issued, waiting for the settle delay.
    Advancing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NarrationAction {
    /// Extract text for `page` unless it is cached or already in flight.
    LoadText { page: usize },
    Speak {
        token: u64,
        page: usize,
        text: String,
        options: SpeechOptions,
    },
    Pause(UtteranceId),
    Resume(UtteranceId),
    Cancel(UtteranceId),
    FlipNext,
    ScheduleContinue { token: u64, delay: Duration },
    Notify(Notice),
}

/// Read-only view of the session state narration depends on.
#[derive(Clone, Copy)]
pub struct NarrationContext<'a> {
    pub texts: &'a TextCache,
    pub page_count: usize,
}

pub struct NarrationController {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) page: usize,
    /// Resume point in characters of the page's normalized text.
    pub(crate) offset: usize,
    /// Offset the active utterance started at; boundaries are relative to it.
    pub(crate) base_offset: usize,
    pub(crate) token: u64,
    pub(crate) utterance: Option<UtteranceId>,
    options: SpeechOptions,
    auto_continue: bool,
    settle_delay: Duration,
    engine_available: bool,
    engine_resumes: bool,
    unsupported_reported: bool,
}

impl NarrationController {
    pub fn new(config: &NarrationConfig, engine_available: bool, engine_resumes: bool) -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            page: 1,
            offset: 0,
            base_offset: 0,
            token: 0,
            utterance: None,
            options: SpeechOptions::from_config(config),
            auto_continue: config.auto_continue,
            settle_delay: config.settle_delay(),
            engine_available,
            engine_resumes,
            unsupported_reported: false,
        }
    }

    pub fn state(&self) -> NarrationState {
        match self.lifecycle {
            Lifecycle::Idle => NarrationState::Idle,
            Lifecycle::Paused => NarrationState::Paused,
            Lifecycle::Preparing | Lifecycle::Speaking | Lifecycle::Advancing => {
                NarrationState::Speaking
            }
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn utterance(&self) -> Option<UtteranceId> {
        self.utterance
    }

    pub fn options(&self) -> &SpeechOptions {
        &self.options
    }

    /// A page finished and the next one has not started yet.
    pub fn is_between_pages(&self) -> bool {
        self.lifecycle == Lifecycle::Advancing
    }

    /// Begin narrating `page` at character `from_offset`.
    pub fn start(
        &mut self,
        page: usize,
        from_offset: usize,
        ctx: NarrationContext<'_>,
    ) -> Vec<NarrationAction> {
        let mut actions = Vec::new();
        if !self.engine_available {
            if !self.unsupported_reported {
                self.unsupported_reported = true;
                info!("Narration requested without a speech engine");
                actions.push(NarrationAction::Notify(Notice::SpeechUnsupported));
            }
            return actions;
        }

        self.release(&mut actions);
        self.token = self.token.wrapping_add(1);
        self.page = page;
        self.offset = from_offset;
        self.base_offset = from_offset;
        info!(page, from_offset, token = self.token, "Starting narration");

        if ctx.texts.contains(page) {
            self.speak_current(ctx, &mut actions);
        } else {
            self.lifecycle = Lifecycle::Preparing;
            actions.push(NarrationAction::LoadText { page });
        }
        actions
    }

    /// Only meaningful while speaking; the utterance is suspended, not
    /// cancelled, and the resume offset is kept. Between pages the pending
    /// continue is dropped and resume starts the next page from its start.
    pub fn pause(&mut self) -> Vec<NarrationAction> {
        match self.lifecycle {
            Lifecycle::Speaking => {
                self.lifecycle = Lifecycle::Paused;
                info!(page = self.page, offset = self.offset, "Pausing narration");
                self.utterance
                    .map(NarrationAction::Pause)
                    .into_iter()
                    .collect()
            }
            Lifecycle::Preparing => {
                self.lifecycle = Lifecycle::Paused;
                Vec::new()
            }
            Lifecycle::Advancing => {
                // The flip to the next page is already issued; park there and
                // let the scheduled continue go stale.
                self.lifecycle = Lifecycle::Paused;
                self.token = self.token.wrapping_add(1);
                self.page += 1;
                self.offset = 0;
                self.base_offset = 0;
                info!(page = self.page, "Pausing narration between pages");
                Vec::new()
            }
            _ => {
                debug!(lifecycle = ?self.lifecycle, "Ignoring pause outside of speaking");
                Vec::new()
            }
        }
    }

    pub fn resume(&mut self, ctx: NarrationContext<'_>) -> Vec<NarrationAction> {
        if self.lifecycle != Lifecycle::Paused {
            debug!(lifecycle = ?self.lifecycle, "Ignoring resume outside of paused");
            return Vec::new();
        }
        match self.utterance {
            Some(id) if self.engine_resumes => {
                self.lifecycle = Lifecycle::Speaking;
                info!(page = self.page, offset = self.offset, "Resuming narration in place");
                vec![NarrationAction::Resume(id)]
            }
            _ => {
                info!(page = self.page, offset = self.offset, "Restarting narration from saved offset");
                self.start(self.page, self.offset, ctx)
            }
        }
    }

    /// Cancel from any state and reset to idle at offset 0.
    pub fn stop(&mut self) -> Vec<NarrationAction> {
        let mut actions = Vec::new();
        self.release(&mut actions);
        self.token = self.token.wrapping_add(1);
        if self.lifecycle != Lifecycle::Idle {
            info!(page = self.page, "Stopping narration");
        }
        self.lifecycle = Lifecycle::Idle;
        self.offset = 0;
        self.base_offset = 0;
        actions
    }

    /// Stop and forget the document being narrated. Speech options are kept;
    /// a missing engine is reported again for the next document.
    pub fn reset(&mut self) -> Vec<NarrationAction> {
        let actions = self.stop();
        self.page = 1;
        self.unsupported_reported = false;
        actions
    }

    /// New voice, rate or pitch. An active utterance restarts from the
    /// current resume offset so the change is audible immediately.
    pub fn set_options(
        &mut self,
        options: SpeechOptions,
        ctx: NarrationContext<'_>,
    ) -> Vec<NarrationAction> {
        self.options = options;
        info!(
            voice = ?self.options.voice,
            rate = self.options.rate,
            pitch = self.options.pitch,
            "Updated speech options"
        );
        if self.lifecycle == Lifecycle::Speaking {
            return self.start(self.page, self.offset, ctx);
        }
        Vec::new()
    }

    /// Bind the engine's handle to the speak request issued under `token`.
    /// A handle for a superseded request is cancelled straight away.
    pub fn attach(&mut self, token: u64, utterance: UtteranceId) -> Option<NarrationAction> {
        if token != self.token || self.utterance.is_some() {
            debug!(token, current = self.token, "Cancelling utterance for superseded request");
            return Some(NarrationAction::Cancel(utterance));
        }
        self.utterance = Some(utterance);
        None
    }

    fn release(&mut self, actions: &mut Vec<NarrationAction>) {
        if let Some(id) = self.utterance.take() {
            actions.push(NarrationAction::Cancel(id));
        }
    }

    /// Issue the speak request for the current page and offset. The page's
    /// text must be cached.
    fn speak_current(&mut self, ctx: NarrationContext<'_>, actions: &mut Vec<NarrationAction>) {
        let text = ctx.texts.get(self.page).unwrap_or_default();
        if text.is_empty() {
            info!(page = self.page, "Page has no extractable text");
            self.lifecycle = Lifecycle::Idle;
            self.offset = 0;
            self.base_offset = 0;
            actions.push(NarrationAction::Notify(Notice::NothingToRead { page: self.page }));
            return;
        }

        let remainder = slice_from_char(text, self.offset);
        if remainder.trim().is_empty() {
            debug!(page = self.page, offset = self.offset, length = char_len(text), "Resume point at end of page");
            self.finish_page(ctx, actions);
            return;
        }

        self.lifecycle = Lifecycle::Speaking;
        actions.push(NarrationAction::Speak {
            token: self.token,
            page: self.page,
            text: remainder.to_string(),
            options: self.options.clone(),
        });
        if self.page < ctx.page_count && !ctx.texts.contains(self.page + 1) {
            actions.push(NarrationAction::LoadText {
                page: self.page + 1,
            });
        }
    }

    /// The page has been spoken to the end: turn the page and continue after
    /// the settle delay, or go idle on the last page.
    fn finish_page(&mut self, ctx: NarrationContext<'_>, actions: &mut Vec<NarrationAction>) {
        self.utterance = None;
        self.offset = 0;
        self.base_offset = 0;
        if self.auto_continue && self.page < ctx.page_count {
            self.lifecycle = Lifecycle::Advancing;
            info!(page = self.page, "Page finished; advancing");
            actions.push(NarrationAction::FlipNext);
            actions.push(NarrationAction::ScheduleContinue {
                token: self.token,
                delay: self.settle_delay,
            });
        } else {
            self.lifecycle = Lifecycle::Idle;
            info!(page = self.page, "Narration finished");
        }
    }
}
