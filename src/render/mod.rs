//! Progressive page rendering: the artifact cache and the scheduler that
//! fills it.

mod cache;
mod scheduler;

pub use cache::{PageArtifact, Quality, RenderCache, StoreOutcome};
pub use scheduler::{Completion, PageStatus, Priority, RenderJob, RenderRequest, RenderScheduler};
