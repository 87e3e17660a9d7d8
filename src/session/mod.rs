//! The reader session: one open document and everything derived from it.
//!
//! `ReaderSession` is a synchronous state holder. Commands and incoming
//! [`Message`]s mutate it and return the [`Effect`]s that need a suspension
//! point; [`crate::runtime::ReaderRuntime`] executes those and feeds the
//! results back. All state changes therefore happen between suspension
//! points, and every asynchronous result is checked against the generation or
//! token it was requested under before it is applied.

mod messages;
mod snapshot;

pub use messages::{Effect, Message, MessageSender};
pub use snapshot::{DocumentSnapshot, NarrationSnapshot, ReaderSnapshot};

use crate::animator::{AnimatorFactory, PageSurface, SurfaceContent};
use crate::cancellation::CancellationToken;
use crate::config::ReaderConfig;
use crate::document::{Document, DocumentInfo};
use crate::error::{Notice, ReaderError, SourceError};
use crate::layout::{LayoutController, Viewport};
use crate::narration::{
    NarrationAction, NarrationContext, NarrationController, NarrationEvent, transition,
};
use crate::render::{Completion, PageStatus, Quality, RenderJob, RenderRequest, RenderScheduler};
use crate::speech::{SpeechEngine, SpeechEvent, SpeechEventSink, SpeechOptions};
use crate::text_cache::TextCache;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Per-document state. Dropped as a whole on close so nothing survives into
/// the next document.
struct OpenDocument {
    document: Document,
    generation: u64,
    current_page: usize,
    renders: RenderScheduler,
    texts: TextCache,
    cancel: CancellationToken,
}

impl OpenDocument {
    fn surface(&self, page: usize) -> PageSurface {
        let content = match self.renders.status(page) {
            PageStatus::Failed { reason } => SurfaceContent::Failed { reason },
            _ => match self.renders.artifact(page) {
                Some(artifact) => SurfaceContent::Image(artifact.clone()),
                None => SurfaceContent::Placeholder,
            },
        };
        PageSurface { page, content }
    }

    fn surfaces(&self) -> Vec<PageSurface> {
        (1..=self.document.page_count())
            .map(|page| self.surface(page))
            .collect()
    }

    fn narration_context(&self) -> NarrationContext<'_> {
        NarrationContext {
            texts: &self.texts,
            page_count: self.document.page_count(),
        }
    }
}

/// What a source request needs besides its job: the document handle and the
/// cancellation flag of the generation it belongs to.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub handle: String,
    pub cancel: CancellationToken,
}

pub struct ReaderSession {
    config: ReaderConfig,
    generation: u64,
    opening: Option<(u64, Document)>,
    open: Option<OpenDocument>,
    layout: LayoutController,
    narration: NarrationController,
    speech: Option<Box<dyn SpeechEngine>>,
    sender: MessageSender,
}

impl ReaderSession {
    pub fn new(
        config: ReaderConfig,
        viewport: Viewport,
        animators: Box<dyn AnimatorFactory>,
        speech: Option<Box<dyn SpeechEngine>>,
        sender: MessageSender,
    ) -> Self {
        let config = config.sanitized();
        let engine_resumes = speech
            .as_ref()
            .is_some_and(|engine| engine.supports_resume());
        let narration = NarrationController::new(&config.narration, speech.is_some(), engine_resumes);
        let layout = LayoutController::new(config.layout.clone(), viewport, animators);
        Self {
            config,
            generation: 0,
            opening: None,
            open: None,
            layout,
            narration,
            speech,
            sender,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn document(&self) -> Option<&Document> {
        self.open.as_ref().map(|open| &open.document)
    }

    /// The page the animator last reported; 1 when nothing is open.
    pub fn current_page(&self) -> usize {
        self.open.as_ref().map_or(1, |open| open.current_page)
    }

    pub fn page_count(&self) -> usize {
        self.open
            .as_ref()
            .map_or(1, |open| open.document.page_count())
    }

    pub fn layout(&self) -> &LayoutController {
        &self.layout
    }

    pub fn narration(&self) -> &NarrationController {
        &self.narration
    }

    pub fn renders(&self) -> Option<&RenderScheduler> {
        self.open.as_ref().map(|open| &open.renders)
    }

    pub fn texts(&self) -> Option<&TextCache> {
        self.open.as_ref().map(|open| &open.texts)
    }

    pub fn job_context(&self, generation: u64) -> Option<JobContext> {
        self.open
            .as_ref()
            .filter(|open| open.generation == generation)
            .map(|open| JobContext {
                handle: open.document.handle.clone(),
                cancel: open.cancel.clone(),
            })
    }

    /// First half of open: tear down whatever was open and reserve a new
    /// generation for `document`. The caller then asks the source for the
    /// document info and hands it to [`ReaderSession::finish_open`].
    pub fn begin_open(&mut self, document: Document) -> u64 {
        self.close();
        self.generation = self.generation.wrapping_add(1);
        info!(handle = %document.handle, generation = self.generation, "Opening document");
        self.opening = Some((self.generation, document));
        self.generation
    }

    pub fn finish_open(
        &mut self,
        generation: u64,
        info: Result<DocumentInfo, SourceError>,
    ) -> Result<Vec<Effect>, ReaderError> {
        let Some((pending, mut document)) = self.opening.take() else {
            return Err(ReaderError::SourceUnavailable("no document is being opened".to_string()));
        };
        if pending != generation {
            debug!(generation, pending, "Ignoring superseded open result");
            self.opening = Some((pending, document));
            return Err(ReaderError::SourceUnavailable("open was superseded".to_string()));
        }

        let info = info.map_err(|err| {
            warn!(handle = %document.handle, "Document source failed to open: {err}");
            ReaderError::SourceUnavailable(err.to_string())
        })?;
        if info.page_count == 0 {
            warn!(handle = %document.handle, "Document source reported no pages");
            return Err(ReaderError::SourceUnavailable(format!(
                "{} has no pages",
                document.handle
            )));
        }
        document.settle(&info);

        let page_count = document.page_count();
        let open = OpenDocument {
            document,
            generation,
            current_page: 1,
            renders: RenderScheduler::new(generation, page_count, self.config.render.clone()),
            texts: TextCache::new(),
            cancel: CancellationToken::new(),
        };
        self.layout.mount(open.surfaces(), 0, self.sender.clone());
        info!(
            handle = %open.document.handle,
            title = %open.document.title,
            page_count,
            generation,
            layout = ?self.layout.layout().mode,
            "Document opened"
        );
        self.open = Some(open);

        let mut effects = Vec::new();
        if let Some(open) = self.open.as_mut() {
            let jobs = open.renders.preload_plan();
            effects.push(Effect::RenderInSequence { generation, jobs });
        }
        Ok(effects)
    }

    /// Stop narration, destroy the animator and drop every per-document
    /// cache. Outstanding requests are cancelled and their results will be
    /// discarded.
    pub fn close(&mut self) {
        self.opening = None;
        let actions = self.narration.reset();
        let mut ignored = Vec::new();
        self.apply_narration(actions, &mut ignored);
        self.layout.unmount();
        if let Some(mut open) = self.open.take() {
            open.cancel.cancel();
            open.texts.clear();
            info!(
                handle = %open.document.handle,
                generation = open.generation,
                in_flight = open.renders.in_flight_len(),
                "Document closed"
            );
        }
    }

    pub fn next(&mut self) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        if open.current_page >= open.document.page_count() {
            debug!(page = open.current_page, "Already at last page");
            return;
        }
        self.layout.flip_next();
    }

    pub fn previous(&mut self) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        if open.current_page <= 1 {
            debug!("Already at first page");
            return;
        }
        self.layout.flip_previous();
    }

    /// Drive the animator towards page `n` (clamped). The current page only
    /// changes once the animator reports it.
    pub fn go_to_page(&mut self, n: usize) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        let target = open.document.clamp_page(n);
        if target == open.current_page {
            debug!(page = target, "Already at requested page");
            return;
        }
        debug!(from = open.current_page, to = target, "Navigating");
        self.layout.flip_to(target - 1);
    }

    /// Idempotent render request for one page at `quality`.
    pub fn render(&mut self, page: usize, quality: Quality) -> RenderRequest {
        match self.open.as_mut() {
            Some(open) => open.renders.render(page, quality),
            None => RenderRequest::OutOfRange,
        }
    }

    pub fn enqueue_background(&mut self, pages: impl IntoIterator<Item = usize>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(open) = self.open.as_mut() {
            open.renders.enqueue_background(pages);
            arm_background(open, &mut effects);
        }
        effects
    }

    /// Clear a failed page and request it again.
    pub fn retry_page(&mut self, page: usize) -> Vec<Effect> {
        let Some(open) = self.open.as_mut() else {
            return Vec::new();
        };
        let Some(job) = open.renders.retry(page) else {
            return Vec::new();
        };
        info!(page, "Retrying page render");
        self.layout.update_surface(open.surface(page));
        vec![Effect::Render(job)]
    }

    pub fn viewport_changed(&mut self, viewport: Viewport) -> Vec<Effect> {
        let ticket = self.layout.viewport_changed(viewport);
        vec![Effect::ScheduleViewportSettle {
            seq: ticket.seq,
            delay: ticket.delay,
        }]
    }

    pub fn start_narration(&mut self, page: usize, from_offset: usize) -> Vec<Effect> {
        let Some(open) = self.open.as_ref() else {
            return Vec::new();
        };
        let page = open.document.clamp_page(page);
        let actions = self.narration.start(page, from_offset, open.narration_context());
        self.run_narration(actions)
    }

    /// Read the current page aloud from its beginning.
    pub fn read_current_page(&mut self) -> Vec<Effect> {
        self.start_narration(self.current_page(), 0)
    }

    pub fn pause_narration(&mut self) -> Vec<Effect> {
        let between_pages = self.narration.is_between_pages();
        let actions = self.narration.pause();
        let mut effects = self.run_narration(actions);
        // Paused between pages: the resume point follows the displayed page.
        let current_page = self.current_page();
        if between_pages && self.narration.page() != current_page {
            self.narration_event(NarrationEvent::PageChanged { page: current_page }, &mut effects);
        }
        effects
    }

    pub fn resume_narration(&mut self) -> Vec<Effect> {
        let Some(open) = self.open.as_ref() else {
            return Vec::new();
        };
        let actions = self.narration.resume(open.narration_context());
        self.run_narration(actions)
    }

    pub fn stop_narration(&mut self) -> Vec<Effect> {
        let actions = self.narration.stop();
        self.run_narration(actions)
    }

    pub fn set_speech_options(
        &mut self,
        voice: Option<String>,
        rate: f32,
        pitch: f32,
    ) -> Vec<Effect> {
        let options = SpeechOptions::new(voice, rate, pitch);
        let actions = match self.open.as_ref() {
            Some(open) => self.narration.set_options(options, open.narration_context()),
            None => self.narration.set_options(
                options,
                NarrationContext {
                    texts: &TextCache::new(),
                    page_count: 1,
                },
            ),
        };
        self.run_narration(actions)
    }

    pub fn handle(&mut self, message: Message) -> Vec<Effect> {
        let mut effects = Vec::new();
        match message {
            Message::PageChanged { animator, index } => {
                if !self.layout.is_current(animator) {
                    debug!(animator = animator.0, index, "Ignoring event from destroyed animator");
                    return effects;
                }
                self.on_page_changed(index + 1, &mut effects);
            }
            Message::Speech { token, event } => {
                let event = match event {
                    SpeechEvent::Boundary { char_index } => {
                        NarrationEvent::Boundary { token, char_index }
                    }
                    SpeechEvent::End => NarrationEvent::Ended { token },
                    SpeechEvent::Error { reason } => NarrationEvent::Failed { token, reason },
                };
                self.narration_event(event, &mut effects);
            }
            Message::PageRendered { job, result } => self.on_page_rendered(job, result, &mut effects),
            Message::PreloadFinished { generation } => {
                let Some(open) = current_mut(&mut self.open, generation) else {
                    return effects;
                };
                let center = open.current_page;
                for job in open.renders.after_preload(center) {
                    effects.push(Effect::Render(job));
                }
                arm_background(open, &mut effects);
            }
            Message::TextExtracted {
                generation,
                page,
                result,
            } => {
                let Some(open) = current_mut(&mut self.open, generation) else {
                    return effects;
                };
                let event = match result {
                    Ok(raw) => {
                        let chars = open.texts.insert(page, &raw).chars().count();
                        debug!(page, chars, "Page text extracted");
                        NarrationEvent::TextReady { page }
                    }
                    Err(err) => {
                        warn!(page, "Text extraction failed: {err}");
                        open.texts.abandon(page);
                        NarrationEvent::TextFailed { page }
                    }
                };
                self.narration_event(event, &mut effects);
            }
            Message::BackgroundTick { generation } => {
                let Some(open) = current_mut(&mut self.open, generation) else {
                    return effects;
                };
                for job in open.renders.next_batch() {
                    effects.push(Effect::Render(job));
                }
                arm_background(open, &mut effects);
            }
            Message::NarrationContinue { token } => {
                let current_page = self.current_page();
                self.narration_event(
                    NarrationEvent::Continue {
                        token,
                        current_page,
                    },
                    &mut effects,
                );
            }
            Message::ViewportSettled { seq } => {
                if self.layout.viewport_settled(seq).is_some() {
                    if let Some(open) = self.open.as_ref() {
                        self.layout.mount(
                            open.surfaces(),
                            open.current_page - 1,
                            self.sender.clone(),
                        );
                    }
                }
            }
        }
        effects
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        let layout = self.layout.layout();
        ReaderSnapshot {
            document: self.open.as_ref().map(|open| DocumentSnapshot {
                handle: open.document.handle.clone(),
                title: open.document.title.clone(),
                author: open.document.author.clone(),
            }),
            current_page: self.current_page(),
            page_count: self.page_count(),
            layout,
            narration: NarrationSnapshot {
                state: self.narration.state(),
                page: self.narration.page(),
                offset: self.narration.offset(),
            },
            pages: self
                .open
                .as_ref()
                .map(|open| {
                    (1..=open.document.page_count())
                        .map(|page| open.renders.status(page))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    fn on_page_changed(&mut self, page: usize, effects: &mut Vec<Effect>) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let page = open.document.clamp_page(page);
        if page != open.current_page {
            debug!(from = open.current_page, to = page, "Animator reported page change");
        }
        open.current_page = page;
        let radius = self.config.render.neighborhood_radius;
        for job in open.renders.ensure_neighborhood(page, radius) {
            effects.push(Effect::Render(job));
        }
        self.narration_event(NarrationEvent::PageChanged { page }, effects);
    }

    fn on_page_rendered(
        &mut self,
        job: RenderJob,
        result: Result<Vec<u8>, SourceError>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(open) = current_mut(&mut self.open, job.generation) else {
            return;
        };
        match open.renders.complete(&job, result) {
            Completion::Stored(artifact) => {
                self.layout.update_surface(PageSurface {
                    page: artifact.page,
                    content: SurfaceContent::Image(artifact),
                });
            }
            Completion::Unchanged => {}
            Completion::Failed(err) => {
                self.layout.update_surface(open.surface(job.page));
                if let ReaderError::PageRenderFailed { page, reason } = err {
                    effects.push(Effect::Notify(Notice::PageRenderFailed { page, reason }));
                }
            }
        }
        arm_background(open, effects);
    }

    fn narration_event(&mut self, event: NarrationEvent, effects: &mut Vec<Effect>) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        let actions = transition(&mut self.narration, event, open.narration_context());
        self.apply_narration(actions, effects);
    }

    fn run_narration(&mut self, actions: Vec<NarrationAction>) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.apply_narration(actions, &mut effects);
        effects
    }

    /// Carry out narration actions. Engine calls happen here, synchronously;
    /// anything that has to wait becomes an effect.
    fn apply_narration(&mut self, actions: Vec<NarrationAction>, effects: &mut Vec<Effect>) {
        let mut queue: VecDeque<NarrationAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                NarrationAction::LoadText { page } => {
                    if let Some(open) = self.open.as_mut() {
                        if open.renders.in_range(page) && open.texts.begin(page) {
                            effects.push(Effect::ExtractText {
                                generation: open.generation,
                                page,
                            });
                        }
                    }
                }
                NarrationAction::Speak {
                    token,
                    page,
                    text,
                    options,
                } => {
                    let Some(engine) = self.speech.as_mut() else {
                        continue;
                    };
                    let sink = SpeechEventSink::new(token, self.sender.clone());
                    match engine.speak(&text, &options, sink) {
                        Ok(utterance) => {
                            debug!(page, token, utterance = utterance.0, "Speak request issued");
                            queue.extend(self.narration.attach(token, utterance));
                        }
                        Err(err) => {
                            let Some(open) = self.open.as_ref() else {
                                continue;
                            };
                            let failed = NarrationEvent::Failed {
                                token,
                                reason: err.to_string(),
                            };
                            queue.extend(transition(
                                &mut self.narration,
                                failed,
                                open.narration_context(),
                            ));
                        }
                    }
                }
                NarrationAction::Pause(utterance) => {
                    if let Some(engine) = self.speech.as_mut() {
                        engine.pause(utterance);
                    }
                }
                NarrationAction::Resume(utterance) => {
                    if let Some(engine) = self.speech.as_mut() {
                        engine.resume(utterance);
                    }
                }
                NarrationAction::Cancel(utterance) => {
                    if let Some(engine) = self.speech.as_mut() {
                        engine.cancel(utterance);
                    }
                }
                NarrationAction::FlipNext => {
                    self.layout.flip_next();
                }
                NarrationAction::ScheduleContinue { token, delay } => {
                    effects.push(Effect::ScheduleNarrationContinue { token, delay });
                }
                NarrationAction::Notify(notice) => effects.push(Effect::Notify(notice)),
            }
        }
    }
}

/// The open document, if `generation` is still the one it was opened under.
fn current_mut(open: &mut Option<OpenDocument>, generation: u64) -> Option<&mut OpenDocument> {
    match open.as_mut() {
        Some(open) if open.generation == generation => Some(open),
        _ => {
            debug!(generation, "Ignoring stale result");
            None
        }
    }
}

fn arm_background(open: &mut OpenDocument, effects: &mut Vec<Effect>) {
    if let Some(delay) = open.renders.arm_background() {
        effects.push(Effect::ScheduleBackground {
            generation: open.generation,
            delay,
        });
    }
}

#[cfg(test)]
mod tests;
