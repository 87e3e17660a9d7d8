//! Executes session effects on a single logical thread.
//!
//! Source requests and timers are polled together in one `FuturesUnordered`;
//! animator and speech notifications arrive on an unbounded channel. Every
//! result is turned back into a [`Message`] and handed to the session, so the
//! session is only ever touched from here and never concurrently.

use crate::animator::AnimatorFactory;
use crate::cancellation::CancellationToken;
use crate::config::ReaderConfig;
use crate::document::{Document, DocumentSource};
use crate::error::{Notice, ReaderError, SourceError};
use crate::layout::Viewport;
use crate::manifest::DocumentEntry;
use crate::render::{Quality, RenderJob, RenderRequest};
use crate::session::{Effect, Message, MessageSender, ReaderSession};
use crate::speech::SpeechEngine;
use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::rc::Rc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

pub struct ReaderRuntime {
    session: ReaderSession,
    source: Rc<dyn DocumentSource>,
    sender: MessageSender,
    receiver: UnboundedReceiver<Message>,
    tasks: FuturesUnordered<LocalBoxFuture<'static, Message>>,
    notices: Vec<Notice>,
}

impl ReaderRuntime {
    pub fn new(
        config: ReaderConfig,
        viewport: Viewport,
        source: Rc<dyn DocumentSource>,
        animators: Box<dyn AnimatorFactory>,
        speech: Option<Box<dyn SpeechEngine>>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = ReaderSession::new(config, viewport, animators, speech, sender.clone());
        Self {
            session,
            source,
            sender,
            receiver,
            tasks: FuturesUnordered::new(),
            notices: Vec::new(),
        }
    }

    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    /// Sender for injecting messages from outside, e.g. platform events.
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    /// Notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Open `document`, replacing whatever was open. On failure the session
    /// stays closed.
    pub async fn open(&mut self, document: Document) -> Result<(), ReaderError> {
        let generation = self.session.begin_open(document.clone());
        let info = self.source.open(&document.handle).await;
        let effects = self.session.finish_open(generation, info)?;
        self.run_effects(effects);
        Ok(())
    }

    pub async fn open_entry(&mut self, entry: &DocumentEntry) -> Result<(), ReaderError> {
        self.open(Document::from_entry(entry)).await
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    pub fn next(&mut self) {
        self.session.next();
    }

    pub fn previous(&mut self) {
        self.session.previous();
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.session.go_to_page(page);
    }

    /// Request `page` at `quality`; an already resident artifact of equal or
    /// better quality is returned without touching the source.
    pub fn render(&mut self, page: usize, quality: Quality) -> RenderRequest {
        let request = self.session.render(page, quality);
        if let RenderRequest::Issued(job) = &request {
            self.run_effect(Effect::Render(job.clone()));
        }
        request
    }

    pub fn enqueue_background(&mut self, pages: impl IntoIterator<Item = usize>) {
        let effects = self.session.enqueue_background(pages);
        self.run_effects(effects);
    }

    pub fn retry_page(&mut self, page: usize) {
        let effects = self.session.retry_page(page);
        self.run_effects(effects);
    }

    pub fn viewport_changed(&mut self, viewport: Viewport) {
        let effects = self.session.viewport_changed(viewport);
        self.run_effects(effects);
    }

    pub fn start_narration(&mut self, page: usize, from_offset: usize) {
        let effects = self.session.start_narration(page, from_offset);
        self.run_effects(effects);
    }

    pub fn read_current_page(&mut self) {
        let effects = self.session.read_current_page();
        self.run_effects(effects);
    }

    pub fn pause_narration(&mut self) {
        let effects = self.session.pause_narration();
        self.run_effects(effects);
    }

    pub fn resume_narration(&mut self) {
        let effects = self.session.resume_narration();
        self.run_effects(effects);
    }

    pub fn stop_narration(&mut self) {
        let effects = self.session.stop_narration();
        self.run_effects(effects);
    }

    pub fn set_speech_options(&mut self, voice: Option<String>, rate: f32, pitch: f32) {
        let effects = self.session.set_speech_options(voice, rate, pitch);
        self.run_effects(effects);
    }

    /// Process queued notifications and in-flight work until nothing is
    /// left. Timers count as work, so this also waits out pending delays.
    /// Notifications are applied as soon as they arrive, including those a
    /// still-running task sends, such as each preview of the preload sequence.
    pub async fn run_until_idle(&mut self) {
        loop {
            self.drain_notifications();
            if self.tasks.is_empty() {
                break;
            }
            tokio::select! {
                biased;
                Some(message) = self.receiver.recv() => self.dispatch(message),
                Some(message) = self.tasks.next() => self.dispatch_task_result(message),
                else => break,
            }
        }
    }

    fn drain_notifications(&mut self) {
        while let Ok(message) = self.receiver.try_recv() {
            self.dispatch(message);
        }
    }

    /// Wait for the next notification or task result and process it.
    pub async fn step(&mut self) {
        tokio::select! {
            biased;
            Some(message) = self.receiver.recv() => self.dispatch(message),
            Some(message) = self.tasks.next(), if !self.tasks.is_empty() => {
                self.dispatch_task_result(message)
            }
        }
    }

    /// Notifications a task sent before finishing precede its result.
    fn dispatch_task_result(&mut self, message: Message) {
        self.drain_notifications();
        self.dispatch(message);
    }

    fn dispatch(&mut self, message: Message) {
        let effects = self.session.handle(message);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Render(job) => {
                let Some(ctx) = self.session.job_context(job.generation) else {
                    debug!(page = job.page, generation = job.generation, "Dropping render for closed document");
                    return;
                };
                let source = Rc::clone(&self.source);
                self.tasks.push(
                    async move {
                        let result = render_page(source.as_ref(), &ctx.handle, &job, &ctx.cancel).await;
                        Message::PageRendered { job, result }
                    }
                    .boxed_local(),
                );
            }
            Effect::RenderInSequence { generation, jobs } => {
                let Some(ctx) = self.session.job_context(generation) else {
                    return;
                };
                let source = Rc::clone(&self.source);
                let sender = self.sender.clone();
                self.tasks.push(
                    async move {
                        for job in jobs {
                            let result =
                                render_page(source.as_ref(), &ctx.handle, &job, &ctx.cancel).await;
                            let _ = sender.send(Message::PageRendered { job, result });
                        }
                        Message::PreloadFinished { generation }
                    }
                    .boxed_local(),
                );
            }
            Effect::ExtractText { generation, page } => {
                let Some(ctx) = self.session.job_context(generation) else {
                    return;
                };
                let source = Rc::clone(&self.source);
                self.tasks.push(
                    async move {
                        let result =
                            extract_page_text(source.as_ref(), &ctx.handle, page, &ctx.cancel).await;
                        Message::TextExtracted {
                            generation,
                            page,
                            result,
                        }
                    }
                    .boxed_local(),
                );
            }
            Effect::ScheduleBackground { generation, delay } => {
                self.tasks.push(
                    async move {
                        tokio::time::sleep(delay).await;
                        Message::BackgroundTick { generation }
                    }
                    .boxed_local(),
                );
            }
            Effect::ScheduleNarrationContinue { token, delay } => {
                self.tasks.push(
                    async move {
                        tokio::time::sleep(delay).await;
                        Message::NarrationContinue { token }
                    }
                    .boxed_local(),
                );
            }
            Effect::ScheduleViewportSettle { seq, delay } => {
                self.tasks.push(
                    async move {
                        tokio::time::sleep(delay).await;
                        Message::ViewportSettled { seq }
                    }
                    .boxed_local(),
                );
            }
            Effect::Notify(notice) => {
                match &notice {
                    Notice::PageRenderFailed { page, reason } => {
                        warn!(page, "Notice: page failed to render: {reason}")
                    }
                    Notice::SpeechFailed { reason } => warn!("Notice: speech failed: {reason}"),
                    other => info!(notice = ?other, "Notice"),
                }
                self.notices.push(notice);
            }
        }
    }
}

async fn render_page(
    source: &dyn DocumentSource,
    handle: &str,
    job: &RenderJob,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, SourceError> {
    cancel.check_cancelled("get_page")?;
    let page = source.get_page(handle, job.page).await?;
    cancel.check_cancelled("rasterize")?;
    let image = source.rasterize(&page, job.scale).await?;
    cancel.check_cancelled("store")?;
    Ok(image)
}

async fn extract_page_text(
    source: &dyn DocumentSource,
    handle: &str,
    page: usize,
    cancel: &CancellationToken,
) -> Result<String, SourceError> {
    cancel.check_cancelled("get_page")?;
    let page = source.get_page(handle, page).await?;
    cancel.check_cancelled("extract_text")?;
    source.extract_text(&page).await
}
