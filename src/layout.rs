//! Viewport classification and ownership of the single mounted animator.

use crate::animator::{
    AnimatorFactory, AnimatorId, AnimatorSpec, PageAnimator, PageEventSink, PageSurface,
};
use crate::config::LayoutConfig;
use crate::debounce::{DebounceTicket, Debouncer};
use crate::session::MessageSender;
use serde::Serialize;
use tracing::{debug, info};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LayoutMode {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Layout mode together with the animator surface size it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Layout {
    pub mode: LayoutMode,
    pub width: u32,
    pub height: u32,
}

pub fn mode_for_width(width: u32, breakpoint: u32) -> LayoutMode {
    if width <= breakpoint {
        LayoutMode::Single
    } else {
        LayoutMode::Double
    }
}

/// Pure: single-page mode fills the viewport minus the chrome allowance,
/// double-page mode always uses the fixed spread size.
pub fn classify(viewport: Viewport, config: &LayoutConfig) -> Layout {
    match mode_for_width(viewport.width, config.breakpoint) {
        LayoutMode::Single => Layout {
            mode: LayoutMode::Single,
            width: viewport
                .width
                .saturating_sub(config.chrome_width)
                .max(config.min_surface_width),
            height: viewport
                .height
                .saturating_sub(config.chrome_height)
                .max(config.min_surface_height),
        },
        LayoutMode::Double => Layout {
            mode: LayoutMode::Double,
            width: config.double_page_width,
            height: config.double_page_height,
        },
    }
}

struct MountedAnimator {
    id: AnimatorId,
    animator: Box<dyn PageAnimator>,
}

pub struct LayoutController {
    config: LayoutConfig,
    viewport: Viewport,
    layout: Layout,
    debounce: Debouncer<Viewport>,
    factory: Box<dyn AnimatorFactory>,
    mounted: Option<MountedAnimator>,
    next_id: u64,
    recreations: usize,
}

impl LayoutController {
    pub fn new(config: LayoutConfig, viewport: Viewport, factory: Box<dyn AnimatorFactory>) -> Self {
        let layout = classify(viewport, &config);
        let debounce = Debouncer::new(config.debounce());
        Self {
            config,
            viewport,
            layout,
            debounce,
            factory,
            mounted: None,
            next_id: 0,
            recreations: 0,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Number of times a live animator was torn down and replaced.
    pub fn recreations(&self) -> usize {
        self.recreations
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn current_id(&self) -> Option<AnimatorId> {
        self.mounted.as_ref().map(|mounted| mounted.id)
    }

    pub fn is_current(&self, id: AnimatorId) -> bool {
        self.current_id() == Some(id)
    }

    /// Record a raw resize signal. The caller fires the returned ticket once
    /// its delay has elapsed; only the latest ticket settles.
    pub fn viewport_changed(&mut self, viewport: Viewport) -> DebounceTicket {
        self.debounce.call(viewport)
    }

    /// Apply the settled viewport. Returns the new layout when it differs
    /// from the current one, meaning the animator must be recreated.
    pub fn viewport_settled(&mut self, seq: u64) -> Option<Layout> {
        let viewport = self.debounce.fire(seq)?;
        self.viewport = viewport;
        let layout = classify(viewport, &self.config);
        if layout == self.layout {
            debug!(width = viewport.width, height = viewport.height, "Viewport settled; layout unchanged");
            return None;
        }
        info!(
            width = viewport.width,
            height = viewport.height,
            mode = ?layout.mode,
            "Viewport settled; layout changed"
        );
        self.layout = layout;
        Some(layout)
    }

    /// Create an animator for the current layout. Any existing animator is
    /// destroyed before the new one is constructed.
    pub fn mount(
        &mut self,
        pages: Vec<PageSurface>,
        start_index: usize,
        sender: MessageSender,
    ) -> AnimatorId {
        if self.unmount() {
            self.recreations += 1;
        }
        self.next_id += 1;
        let id = AnimatorId(self.next_id);
        let spec = AnimatorSpec {
            width: self.layout.width,
            height: self.layout.height,
            mode: self.layout.mode,
            pages,
            start_index,
        };
        let animator = self.factory.create(spec, PageEventSink::new(id, sender));
        info!(animator = id.0, mode = ?self.layout.mode, start_index, "Animator mounted");
        self.mounted = Some(MountedAnimator { id, animator });
        id
    }

    /// Destroy the mounted animator, if any. Returns whether one existed.
    pub fn unmount(&mut self) -> bool {
        match self.mounted.take() {
            Some(mut mounted) => {
                mounted.animator.destroy();
                debug!(animator = mounted.id.0, "Animator destroyed");
                true
            }
            None => false,
        }
    }

    /// Run `command` against the mounted animator. Returns false when nothing
    /// is mounted.
    fn with_animator(&mut self, command: impl FnOnce(&mut dyn PageAnimator)) -> bool {
        match self.mounted.as_mut() {
            Some(mounted) => {
                command(mounted.animator.as_mut());
                true
            }
            None => false,
        }
    }

    pub fn flip_next(&mut self) -> bool {
        self.with_animator(|animator| animator.flip_next())
    }

    pub fn flip_previous(&mut self) -> bool {
        self.with_animator(|animator| animator.flip_previous())
    }

    pub fn flip_to(&mut self, index: usize) -> bool {
        self.with_animator(|animator| animator.flip_to(index))
    }

    pub fn update_surface(&mut self, surface: PageSurface) -> bool {
        self.with_animator(|animator| animator.update_surface(surface))
    }
}
