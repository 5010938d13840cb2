//! Speaker diarization adapters.
//!
//! Diarization is optional by design: a session's pipeline never fails
//! because speakers could not be separated. Engine failures are converted to
//! an explicit `Diarization::Unavailable` at this boundary, and fusion
//! degrades to the single-speaker fallback path.

use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// One speaker-attributed time interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerTurn {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds, > start.
    pub end: f64,
    pub speaker: String,
}

/// Outcome of a diarization run.
///
/// The unavailable case carries the reason so the session log explains why a
/// transcript came out single-speaker.
#[derive(Debug, Clone, PartialEq)]
pub enum Diarization {
    /// Turns ordered ascending by start time. May be empty for silence.
    Turns(Vec<SpeakerTurn>),
    /// The engine could not produce turns (not configured, failed, etc.).
    Unavailable { reason: String },
}

impl Diarization {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Diarization::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Trait for speaker diarization of a reassembled recording.
///
/// Infallible by contract: implementations catch engine errors and return
/// `Diarization::Unavailable` instead of propagating them.
pub trait Diarizer: Send + Sync {
    fn diarize(&self, audio_path: &Path) -> Diarization;

    /// Get the name of the loaded model.
    fn model_name(&self) -> &str;
}

/// Implement Diarizer for Arc<T> so one loaded engine can be shared.
impl<T: Diarizer> Diarizer for Arc<T> {
    fn diarize(&self, audio_path: &Path) -> Diarization {
        (**self).diarize(audio_path)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Diarizer used when no engine is configured.
#[derive(Debug, Default)]
pub struct NullDiarizer;

impl NullDiarizer {
    pub fn new() -> Self {
        Self
    }
}

impl Diarizer for NullDiarizer {
    fn diarize(&self, audio_path: &Path) -> Diarization {
        warn!(
            audio_file = %audio_path.display(),
            "diarization engine not configured, transcript will be single-speaker"
        );
        Diarization::unavailable("diarization engine not configured")
    }

    fn model_name(&self) -> &str {
        "none"
    }
}

/// Mock diarizer for testing.
pub struct MockDiarizer {
    model_name: String,
    result: Diarization,
}

impl MockDiarizer {
    /// Create a mock that reports the engine as unavailable.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            result: Diarization::unavailable("mock diarizer without turns"),
        }
    }

    /// Configure the turns returned by every call.
    pub fn with_turns(mut self, turns: Vec<SpeakerTurn>) -> Self {
        self.result = Diarization::Turns(turns);
        self
    }

    /// Configure the mock to report unavailability with a given reason.
    pub fn with_unavailable(mut self, reason: &str) -> Self {
        self.result = Diarization::unavailable(reason);
        self
    }
}

impl Diarizer for MockDiarizer {
    fn diarize(&self, _audio_path: &Path) -> Diarization {
        self.result.clone()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
