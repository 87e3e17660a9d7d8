//! Speech-engine collaborator contract.

use crate::config::NarrationConfig;
use crate::error::SpeechError;
use crate::session::{Message, MessageSender};

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

impl SpeechOptions {
    pub fn new(voice: Option<String>, rate: f32, pitch: f32) -> Self {
        Self {
            voice,
            rate: rate.clamp(0.1, 10.0),
            pitch: pitch.clamp(0.0, 2.0),
        }
    }

    pub fn from_config(config: &NarrationConfig) -> Self {
        Self::new(config.voice.clone(), config.rate, config.pitch)
    }
}

/// Engine-assigned handle of one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Character index (Unicode scalar values) into the text passed to
    /// `speak`, at the word about to be spoken.
    Boundary { char_index: usize },
    End,
    Error { reason: String },
}

/// Where an engine reports progress of one utterance. Each sink is bound to
/// the narration request that created it.
#[derive(Debug, Clone)]
pub struct SpeechEventSink {
    token: u64,
    sender: MessageSender,
}

impl SpeechEventSink {
    pub(crate) fn new(token: u64, sender: MessageSender) -> Self {
        Self { token, sender }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn boundary(&self, char_index: usize) {
        self.emit(SpeechEvent::Boundary { char_index });
    }

    pub fn ended(&self) {
        self.emit(SpeechEvent::End);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.emit(SpeechEvent::Error {
            reason: reason.into(),
        });
    }

    fn emit(&self, event: SpeechEvent) {
        // The runtime may already be gone; nothing is listening then.
        let _ = self.sender.send(Message::Speech {
            token: self.token,
            event,
        });
    }
}

/// Text-to-speech backend. Calls return immediately; progress arrives through
/// the [`SpeechEventSink`] given to `speak`.
pub trait SpeechEngine {
    fn speak(
        &mut self,
        text: &str,
        options: &SpeechOptions,
        events: SpeechEventSink,
    ) -> Result<UtteranceId, SpeechError>;

    fn pause(&mut self, utterance: UtteranceId);

    fn resume(&mut self, utterance: UtteranceId);

    fn cancel(&mut self, utterance: UtteranceId);

    /// Whether `resume` continues the paused utterance in place. Engines that
    /// cannot are restarted from the saved offset instead.
    fn supports_resume(&self) -> bool {
        true
    }
}
