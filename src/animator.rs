//! Page-flip animator collaborator contract, plus a headless implementation
//! used by the command-line walker.

use crate::layout::LayoutMode;
use crate::render::PageArtifact;
use crate::session::{Message, MessageSender};
use tracing::debug;

/// Identifies one animator instance. Events from a destroyed instance carry
/// an id the session no longer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimatorId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceContent {
    Placeholder,
    Image(PageArtifact),
    Failed { reason: String },
}

/// What one page slot of the animator should display.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSurface {
    pub page: usize,
    pub content: SurfaceContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimatorSpec {
    pub width: u32,
    pub height: u32,
    pub mode: LayoutMode,
    /// One surface per page, in order; index `i` is page `i + 1`.
    pub pages: Vec<PageSurface>,
    pub start_index: usize,
}

#[derive(Debug, Clone)]
pub struct PageEventSink {
    animator: AnimatorId,
    sender: MessageSender,
}

impl PageEventSink {
    pub(crate) fn new(animator: AnimatorId, sender: MessageSender) -> Self {
        Self { animator, sender }
    }

    pub fn animator(&self) -> AnimatorId {
        self.animator
    }

    /// Report that the animator now shows the page at zero-based `index`.
    pub fn page_changed(&self, index: usize) {
        let _ = self.sender.send(Message::PageChanged {
            animator: self.animator,
            index,
        });
    }
}

/// A mounted flip animator. Flip commands start an animation and return;
/// the resulting page arrives later through the [`PageEventSink`].
pub trait PageAnimator {
    fn flip_next(&mut self);

    fn flip_previous(&mut self);

    fn flip_to(&mut self, index: usize);

    /// Swap the content shown for one page in place.
    fn update_surface(&mut self, surface: PageSurface);

    /// Release everything the animator holds. No events follow.
    fn destroy(&mut self);
}

pub trait AnimatorFactory {
    fn create(&mut self, spec: AnimatorSpec, events: PageEventSink) -> Box<dyn PageAnimator>;
}

/// Animator without a display: flips complete instantly and surfaces are
/// merely recorded.
pub struct HeadlessAnimator {
    surfaces: Vec<PageSurface>,
    index: usize,
    events: PageEventSink,
    destroyed: bool,
}

impl HeadlessAnimator {
    pub fn new(spec: AnimatorSpec, events: PageEventSink) -> Self {
        let index = spec.start_index.min(spec.pages.len().saturating_sub(1));
        Self {
            surfaces: spec.pages,
            index,
            events,
            destroyed: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn surface(&self, index: usize) -> Option<&PageSurface> {
        self.surfaces.get(index)
    }

    fn move_to(&mut self, index: usize) {
        if self.destroyed || index >= self.surfaces.len() || index == self.index {
            return;
        }
        self.index = index;
        self.events.page_changed(index);
    }
}

impl PageAnimator for HeadlessAnimator {
    fn flip_next(&mut self) {
        self.move_to(self.index + 1);
    }

    fn flip_previous(&mut self) {
        if let Some(index) = self.index.checked_sub(1) {
            self.move_to(index);
        }
    }

    fn flip_to(&mut self, index: usize) {
        self.move_to(index);
    }

    fn update_surface(&mut self, surface: PageSurface) {
        if self.destroyed {
            return;
        }
        if let Some(slot) = surface
            .page
            .checked_sub(1)
            .and_then(|index| self.surfaces.get_mut(index))
        {
            *slot = surface;
        }
    }

    fn destroy(&mut self) {
        debug!(animator = self.events.animator().0, "Destroying headless animator");
        self.destroyed = true;
        self.surfaces.clear();
    }
}

#[derive(Debug, Default)]
pub struct HeadlessAnimatorFactory;

impl HeadlessAnimatorFactory {
    pub fn new() -> Self {
        Self
    }
}

impl AnimatorFactory for HeadlessAnimatorFactory {
    fn create(&mut self, spec: AnimatorSpec, events: PageEventSink) -> Box<dyn PageAnimator> {
        debug!(
            width = spec.width,
            height = spec.height,
            mode = ?spec.mode,
            pages = spec.pages.len(),
            "Creating headless animator"
        );
        Box::new(HeadlessAnimator::new(spec, events))
    }
}
