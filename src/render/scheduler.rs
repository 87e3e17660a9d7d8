//! Decides which pages to rasterize, in what order and at what quality.
//!
//! The scheduler never talks to the document source itself. Each call returns
//! the [`RenderJob`]s that should be issued now; the runtime executes them and
//! reports back through [`RenderScheduler::complete`]. Work is tracked per
//! `(page, quality)` so the same render is never requested twice while one is
//! in flight.

use super::cache::{PageArtifact, Quality, RenderCache};
use crate::config::RenderConfig;
use crate::error::{ReaderError, SourceError};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use ts_rs::TS;

/// Why a render was requested. Only affects bookkeeping and logging; issue
/// order is what establishes priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Fast first content right after open, rendered one page at a time.
    Preload,
    /// Pages around the one the animator is showing.
    Neighborhood,
    /// Preloaded pages lifted from preview to standard.
    Upgrade,
    Background,
    Retry,
    OnDemand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub generation: u64,
    pub page: usize,
    pub quality: Quality,
    pub scale: f32,
    pub priority: Priority,
}

/// Result of an explicit [`RenderScheduler::render`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    /// An artifact of equal or higher quality is already resident.
    Resident(PageArtifact),
    Issued(RenderJob),
    /// A render of equal or higher quality is already in flight.
    Pending,
    OutOfRange,
}

#[derive(Debug)]
pub enum Completion {
    /// The cache changed; the displayed surface should be swapped.
    Stored(PageArtifact),
    /// A better artifact was already resident, or the request was cancelled.
    Unchanged,
    Failed(ReaderError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export)]
pub enum PageStatus {
    Pending,
    Rendering,
    Ready { quality: Quality },
    /// Shown as a placeholder with a retry action.
    Failed { reason: String },
}

pub struct RenderScheduler {
    generation: u64,
    page_count: usize,
    config: RenderConfig,
    cache: RenderCache,
    in_flight: HashSet<(usize, Quality)>,
    failed: BTreeMap<usize, String>,
    queue: VecDeque<usize>,
    queued: HashSet<usize>,
    background_in_flight: usize,
    background_armed: bool,
}

impl RenderScheduler {
    pub fn new(generation: u64, page_count: usize, config: RenderConfig) -> Self {
        Self {
            generation,
            page_count: page_count.max(1),
            config,
            cache: RenderCache::new(),
            in_flight: HashSet::new(),
            failed: BTreeMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            background_in_flight: 0,
            background_armed: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn artifact(&self, page: usize) -> Option<&PageArtifact> {
        self.cache.get(page)
    }

    pub fn in_range(&self, page: usize) -> bool {
        (1..=self.page_count).contains(&page)
    }

    pub fn is_failed(&self, page: usize) -> bool {
        self.failed.contains_key(&page)
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn status(&self, page: usize) -> PageStatus {
        if let Some(reason) = self.failed.get(&page) {
            return PageStatus::Failed {
                reason: reason.clone(),
            };
        }
        if let Some(quality) = self.cache.quality(page) {
            return PageStatus::Ready { quality };
        }
        if self.in_flight.iter().any(|(p, _)| *p == page) {
            return PageStatus::Rendering;
        }
        PageStatus::Pending
    }

    fn in_flight_at_least(&self, page: usize, quality: Quality) -> bool {
        Quality::ALL
            .iter()
            .filter(|candidate| **candidate >= quality)
            .any(|candidate| self.in_flight.contains(&(page, *candidate)))
    }

    /// True when neither the cache nor an in-flight request covers `quality`.
    fn needs(&self, page: usize, quality: Quality) -> bool {
        !self.cache.has_at_least(page, quality) && !self.in_flight_at_least(page, quality)
    }

    fn issue(&mut self, page: usize, quality: Quality, priority: Priority) -> RenderJob {
        self.in_flight.insert((page, quality));
        if priority == Priority::Background {
            self.background_in_flight += 1;
        }
        debug!(
            page,
            %quality,
            ?priority,
            generation = self.generation,
            "Issuing page render"
        );
        RenderJob {
            generation: self.generation,
            page,
            quality,
            scale: self.config.scale_for(quality),
            priority,
        }
    }

    /// Idempotent single-page render request.
    pub fn render(&mut self, page: usize, quality: Quality) -> RenderRequest {
        if !self.in_range(page) {
            return RenderRequest::OutOfRange;
        }
        if let Some(artifact) = self.cache.get(page) {
            if artifact.quality >= quality {
                return RenderRequest::Resident(artifact.clone());
            }
        }
        if self.in_flight_at_least(page, quality) {
            return RenderRequest::Pending;
        }
        RenderRequest::Issued(self.issue(page, quality, Priority::OnDemand))
    }

    /// Jobs that bring `[center - radius, center + radius]` up to standard
    /// quality, nearest pages first. Failed pages wait for an explicit retry.
    pub fn ensure_neighborhood(&mut self, center: usize, radius: usize) -> Vec<RenderJob> {
        let center = center.clamp(1, self.page_count);
        let mut pages = vec![center];
        for distance in 1..=radius {
            if let Some(before) = center.checked_sub(distance).filter(|p| *p >= 1) {
                pages.push(before);
            }
            let after = center + distance;
            if after <= self.page_count {
                pages.push(after);
            }
        }

        let mut jobs = Vec::new();
        for page in pages {
            if self.is_failed(page) || !self.needs(page, Quality::Standard) {
                continue;
            }
            jobs.push(self.issue(page, Quality::Standard, Priority::Neighborhood));
        }
        jobs
    }

    /// First phase after open: preview renders for the leading pages. The
    /// runtime issues these one after another so page 1 lands first.
    pub fn preload_plan(&mut self) -> Vec<RenderJob> {
        let last = self.config.preload_pages.min(self.page_count);
        (1..=last)
            .filter(|page| self.needs(*page, Quality::Preview))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|page| self.issue(page, Quality::Preview, Priority::Preload))
            .collect()
    }

    /// Second phase after open: neighborhood at standard, the remaining
    /// preloaded pages upgraded to standard, then every page queued for a
    /// high-quality background pass.
    pub fn after_preload(&mut self, center: usize) -> Vec<RenderJob> {
        let mut jobs = self.ensure_neighborhood(center, self.config.neighborhood_radius);
        let last = self.config.preload_pages.min(self.page_count);
        for page in 1..=last {
            if self.is_failed(page) || !self.needs(page, Quality::Standard) {
                continue;
            }
            jobs.push(self.issue(page, Quality::Standard, Priority::Upgrade));
        }
        self.enqueue_background(1..=self.page_count);
        info!(
            generation = self.generation,
            immediate = jobs.len(),
            queued = self.queue.len(),
            "Preload finished; upgrading and queueing background renders"
        );
        jobs
    }

    /// Append pages to the FIFO background queue. Pages already queued keep
    /// their position.
    pub fn enqueue_background(&mut self, pages: impl IntoIterator<Item = usize>) {
        for page in pages {
            if self.in_range(page) && self.queued.insert(page) {
                self.queue.push_back(page);
            }
        }
    }

    /// Delay before the next background batch, if one should be scheduled
    /// now. Only one batch is ever armed or running at a time.
    pub fn arm_background(&mut self) -> Option<Duration> {
        if self.background_armed || self.background_in_flight > 0 || self.queue.is_empty() {
            return None;
        }
        self.background_armed = true;
        Some(self.config.background_delay())
    }

    /// Pop up to `background_batch_size` pages that still need a
    /// high-quality render.
    pub fn next_batch(&mut self) -> Vec<RenderJob> {
        self.background_armed = false;
        let mut jobs = Vec::new();
        while jobs.len() < self.config.background_batch_size {
            let Some(page) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&page);
            if self.is_failed(page) || !self.needs(page, Quality::High) {
                continue;
            }
            jobs.push(self.issue(page, Quality::High, Priority::Background));
        }
        if !jobs.is_empty() {
            debug!(
                generation = self.generation,
                batch = jobs.len(),
                remaining = self.queue.len(),
                "Dispatching background render batch"
            );
        }
        jobs
    }

    pub fn complete(
        &mut self,
        job: &RenderJob,
        result: Result<Vec<u8>, SourceError>,
    ) -> Completion {
        self.in_flight.remove(&(job.page, job.quality));
        if job.priority == Priority::Background {
            self.background_in_flight = self.background_in_flight.saturating_sub(1);
        }

        match result {
            Ok(image) => {
                self.failed.remove(&job.page);
                let artifact = PageArtifact::new(job.page, job.quality, image);
                let outcome = self.cache.store(artifact.clone());
                debug!(page = job.page, quality = %job.quality, ?outcome, "Page render finished");
                if outcome.changed() {
                    Completion::Stored(artifact)
                } else {
                    Completion::Unchanged
                }
            }
            Err(SourceError::Cancelled(stage)) => {
                debug!(page = job.page, stage, "Page render cancelled");
                Completion::Unchanged
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(page = job.page, quality = %job.quality, "Page render failed: {reason}");
                if self.cache.get(job.page).is_none() {
                    self.failed.insert(job.page, reason.clone());
                }
                Completion::Failed(ReaderError::PageRenderFailed {
                    page: job.page,
                    reason,
                })
            }
        }
    }

    /// Clear a page's failed state and request it again at standard quality.
    pub fn retry(&mut self, page: usize) -> Option<RenderJob> {
        if !self.in_range(page) {
            return None;
        }
        self.failed.remove(&page);
        if !self.needs(page, Quality::Standard) {
            return None;
        }
        Some(self.issue(page, Quality::Standard, Priority::Retry))
    }
}
