use crate::animator::AnimatorId;
use crate::error::{Notice, SourceError};
use crate::render::RenderJob;
use crate::speech::SpeechEvent;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub type MessageSender = UnboundedSender<Message>;

/// Everything that can happen to a session after the call that caused it has
/// returned: collaborator notifications, finished source requests and fired
/// timers. Requests carry the generation or token they were issued under so
/// late arrivals can be recognized and dropped.
#[derive(Debug)]
pub enum Message {
    PageChanged {
        animator: AnimatorId,
        index: usize,
    },
    Speech {
        token: u64,
        event: SpeechEvent,
    },
    PageRendered {
        job: RenderJob,
        result: Result<Vec<u8>, SourceError>,
    },
    PreloadFinished {
        generation: u64,
    },
    TextExtracted {
        generation: u64,
        page: usize,
        result: Result<String, SourceError>,
    },
    BackgroundTick {
        generation: u64,
    },
    NarrationContinue {
        token: u64,
    },
    ViewportSettled {
        seq: u64,
    },
}

/// Work the session cannot do synchronously. The runtime executes these and
/// feeds the outcome back as a [`Message`].
#[derive(Debug)]
pub enum Effect {
    /// Issued immediately, concurrently with everything else in flight.
    Render(RenderJob),
    /// Issued one after another, then `PreloadFinished`.
    RenderInSequence {
        generation: u64,
        jobs: Vec<RenderJob>,
    },
    ExtractText {
        generation: u64,
        page: usize,
    },
    ScheduleBackground {
        generation: u64,
        delay: Duration,
    },
    ScheduleNarrationContinue {
        token: u64,
        delay: Duration,
    },
    ScheduleViewportSettle {
        seq: u64,
        delay: Duration,
    },
    Notify(Notice),
}
