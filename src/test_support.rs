//! Collaborator fakes shared by the unit tests.

use crate::animator::{
    AnimatorFactory, AnimatorSpec, HeadlessAnimator, PageAnimator, PageEventSink, PageSurface,
};
use crate::document::{DocumentInfo, DocumentSource, PageHandle};
use crate::error::{SourceError, SpeechError};
use crate::speech::{SpeechEngine, SpeechEventSink, SpeechOptions, UtteranceId};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

#[derive(Default)]
struct FakeDocument {
    page_count: usize,
    texts: HashMap<usize, String>,
    failing: HashSet<usize>,
}

#[derive(Default)]
struct SourceState {
    documents: HashMap<String, FakeDocument>,
    delay: Option<Duration>,
    opens: usize,
    rasterized: Vec<(String, usize, f32)>,
    extracted: Vec<(String, usize)>,
}

/// In-memory document source. Clones share state, so a test keeps one handle
/// for assertions after giving another to the runtime.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Rc<RefCell<SourceState>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, handle: &str, page_count: usize) -> Self {
        self.state.borrow_mut().documents.insert(
            handle.to_string(),
            FakeDocument {
                page_count,
                ..FakeDocument::default()
            },
        );
        self
    }

    pub fn with_text(self, handle: &str, page: usize, text: &str) -> Self {
        if let Some(doc) = self.state.borrow_mut().documents.get_mut(handle) {
            doc.texts.insert(page, text.to_string());
        }
        self
    }

    pub fn with_failing_page(self, handle: &str, page: usize) -> Self {
        if let Some(doc) = self.state.borrow_mut().documents.get_mut(handle) {
            doc.failing.insert(page);
        }
        self
    }

    /// Every rasterize and extract call sleeps this long first.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.borrow_mut().delay = Some(delay);
        self
    }

    pub fn heal_page(&self, handle: &str, page: usize) {
        if let Some(doc) = self.state.borrow_mut().documents.get_mut(handle) {
            doc.failing.remove(&page);
        }
    }

    pub fn opens(&self) -> usize {
        self.state.borrow().opens
    }

    pub fn rasterize_calls(&self, handle: &str, page: usize) -> usize {
        self.state
            .borrow()
            .rasterized
            .iter()
            .filter(|(h, p, _)| h == handle && *p == page)
            .count()
    }

    /// `(page, scale)` of every rasterize call for `handle`, in call order.
    pub fn rasterize_log(&self, handle: &str) -> Vec<(usize, f32)> {
        self.state
            .borrow()
            .rasterized
            .iter()
            .filter(|(h, _, _)| h == handle)
            .map(|(_, page, scale)| (*page, *scale))
            .collect()
    }

    pub fn total_rasterize_calls(&self) -> usize {
        self.state.borrow().rasterized.len()
    }

    pub fn extract_calls(&self, handle: &str, page: usize) -> usize {
        self.state
            .borrow()
            .extracted
            .iter()
            .filter(|(h, p)| h == handle && *p == page)
            .count()
    }

    /// The bytes `rasterize` returns, so tests can tell which document and
    /// scale an artifact came from.
    pub fn image_bytes(handle: &str, page: usize, scale: f32) -> Vec<u8> {
        format!("{handle}#{page}@{scale}").into_bytes()
    }

    fn delay(&self) -> Option<Duration> {
        self.state.borrow().delay
    }
}

#[async_trait(?Send)]
impl DocumentSource for FakeSource {
    async fn open(&self, handle: &str) -> Result<DocumentInfo, SourceError> {
        let mut state = self.state.borrow_mut();
        state.opens += 1;
        let doc = state
            .documents
            .get(handle)
            .ok_or_else(|| SourceError::Malformed(format!("unknown document {handle}")))?;
        Ok(DocumentInfo {
            page_count: doc.page_count,
            title: Some(format!("Title of {handle}")),
            author: None,
        })
    }

    async fn get_page(&self, handle: &str, number: usize) -> Result<PageHandle, SourceError> {
        let state = self.state.borrow();
        let doc = state
            .documents
            .get(handle)
            .ok_or(SourceError::PageNotFound(number))?;
        if number == 0 || number > doc.page_count {
            return Err(SourceError::PageNotFound(number));
        }
        Ok(PageHandle {
            number,
            locator: handle.to_string(),
        })
    }

    async fn rasterize(&self, page: &PageHandle, scale: f32) -> Result<Vec<u8>, SourceError> {
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.borrow_mut();
        state
            .rasterized
            .push((page.locator.clone(), page.number, scale));
        let failing = state
            .documents
            .get(&page.locator)
            .is_some_and(|doc| doc.failing.contains(&page.number));
        if failing {
            return Err(SourceError::Malformed(format!("page {} is corrupt", page.number)));
        }
        Ok(Self::image_bytes(&page.locator, page.number, scale))
    }

    async fn extract_text(&self, page: &PageHandle) -> Result<String, SourceError> {
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.borrow_mut();
        state.extracted.push((page.locator.clone(), page.number));
        Ok(state
            .documents
            .get(&page.locator)
            .and_then(|doc| doc.texts.get(&page.number).cloned())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechCall {
    Speak { id: UtteranceId, text: String, options: SpeechOptions },
    Pause(UtteranceId),
    Resume(UtteranceId),
    Cancel(UtteranceId),
}

#[derive(Default)]
struct SpeechState {
    next_id: u64,
    calls: Vec<SpeechCall>,
    sinks: HashMap<UtteranceId, SpeechEventSink>,
    reject: bool,
}

/// Speech engine that records calls and lets the test emit events for any
/// utterance it started.
#[derive(Clone)]
pub struct ScriptedSpeech {
    state: Rc<RefCell<SpeechState>>,
    resumes: bool,
}

impl ScriptedSpeech {
    pub fn new() -> Self {
        Self {
            state: Rc::default(),
            resumes: true,
        }
    }

    pub fn without_resume() -> Self {
        Self {
            resumes: false,
            ..Self::new()
        }
    }

    pub fn reject_next(&self) {
        self.state.borrow_mut().reject = true;
    }

    pub fn calls(&self) -> Vec<SpeechCall> {
        self.state.borrow().calls.clone()
    }

    /// Text of every speak request, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                SpeechCall::Speak { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_utterance(&self) -> Option<UtteranceId> {
        self.state
            .borrow()
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                SpeechCall::Speak { id, .. } => Some(*id),
                _ => None,
            })
    }

    pub fn sink(&self, id: UtteranceId) -> SpeechEventSink {
        self.state.borrow().sinks[&id].clone()
    }

    /// Sink of the most recent speak request.
    pub fn current(&self) -> SpeechEventSink {
        let id = self.last_utterance().expect("nothing spoken yet");
        self.sink(id)
    }
}

impl SpeechEngine for ScriptedSpeech {
    fn speak(
        &mut self,
        text: &str,
        options: &SpeechOptions,
        events: SpeechEventSink,
    ) -> Result<UtteranceId, SpeechError> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.reject) {
            return Err(SpeechError::VoiceUnavailable("scripted rejection".to_string()));
        }
        state.next_id += 1;
        let id = UtteranceId(state.next_id);
        state.calls.push(SpeechCall::Speak {
            id,
            text: text.to_string(),
            options: options.clone(),
        });
        state.sinks.insert(id, events);
        Ok(id)
    }

    fn pause(&mut self, utterance: UtteranceId) {
        self.state.borrow_mut().calls.push(SpeechCall::Pause(utterance));
    }

    fn resume(&mut self, utterance: UtteranceId) {
        self.state.borrow_mut().calls.push(SpeechCall::Resume(utterance));
    }

    fn cancel(&mut self, utterance: UtteranceId) {
        self.state.borrow_mut().calls.push(SpeechCall::Cancel(utterance));
    }

    fn supports_resume(&self) -> bool {
        self.resumes
    }
}

#[derive(Default)]
struct AnimatorState {
    created: usize,
    live: usize,
    max_live: usize,
    specs: Vec<AnimatorSpec>,
    surface_updates: Vec<PageSurface>,
}

/// Wraps [`HeadlessAnimator`] and counts instances, so tests can assert that
/// two animators are never alive at once.
#[derive(Clone, Default)]
pub struct RecordingAnimatorFactory {
    state: Rc<RefCell<AnimatorState>>,
}

impl RecordingAnimatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.state.borrow().created
    }

    pub fn live(&self) -> usize {
        self.state.borrow().live
    }

    pub fn max_live(&self) -> usize {
        self.state.borrow().max_live
    }

    pub fn specs(&self) -> Vec<AnimatorSpec> {
        self.state.borrow().specs.clone()
    }

    pub fn surface_updates(&self) -> Vec<PageSurface> {
        self.state.borrow().surface_updates.clone()
    }
}

struct RecordingAnimator {
    inner: HeadlessAnimator,
    state: Rc<RefCell<AnimatorState>>,
    alive: bool,
}

impl PageAnimator for RecordingAnimator {
    fn flip_next(&mut self) {
        self.inner.flip_next();
    }

    fn flip_previous(&mut self) {
        self.inner.flip_previous();
    }

    fn flip_to(&mut self, index: usize) {
        self.inner.flip_to(index);
    }

    fn update_surface(&mut self, surface: PageSurface) {
        self.state.borrow_mut().surface_updates.push(surface.clone());
        self.inner.update_surface(surface);
    }

    fn destroy(&mut self) {
        if std::mem::take(&mut self.alive) {
            self.state.borrow_mut().live -= 1;
        }
        self.inner.destroy();
    }
}

impl AnimatorFactory for RecordingAnimatorFactory {
    fn create(&mut self, spec: AnimatorSpec, events: PageEventSink) -> Box<dyn PageAnimator> {
        {
            let mut state = self.state.borrow_mut();
            state.created += 1;
            state.live += 1;
            state.max_live = state.max_live.max(state.live);
            state.specs.push(spec.clone());
        }
        Box::new(RecordingAnimator {
            inner: HeadlessAnimator::new(spec, events),
            state: Rc::clone(&self.state),
            alive: true,
        })
    }
}
