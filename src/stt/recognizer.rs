//! Recognition engine contract.

use crate::error::{Result, TabscribeError};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// One time-stamped text segment from the recognition engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSegment {
    /// Start time in seconds, >= 0.
    pub start: f64,
    /// End time in seconds, > start.
    pub end: f64,
    pub text: String,
    /// Engine's probability that the segment contains no speech, in [0, 1].
    pub no_speech_prob: f64,
}

/// Full output of one recognition run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutput {
    /// Language reported by the engine (may differ from the hint).
    pub language: String,
    pub text: String,
    /// Segments ordered ascending by start time, non-overlapping.
    pub segments: Vec<RecognitionSegment>,
}

/// Trait for speech-to-text recognition of a reassembled recording.
///
/// This trait allows swapping implementations (real Whisper vs mock).
/// Implementations own any required synchronization: loaded models are
/// expensive singletons and one instance processes one file at a time.
pub trait Recognizer: Send + Sync {
    /// Transcribe the audio file at `audio_path`.
    ///
    /// Errors here are fatal to the session's pipeline — without text there
    /// is nothing to fuse.
    fn recognize(&self, audio_path: &Path, language_hint: &str) -> Result<RecognitionOutput>;

    /// Get the name of the loaded model.
    fn model_name(&self) -> &str;
}

/// Implement Recognizer for Arc<T> so one loaded engine can be shared.
impl<T: Recognizer> Recognizer for Arc<T> {
    fn recognize(&self, audio_path: &Path, language_hint: &str) -> Result<RecognitionOutput> {
        (**self).recognize(audio_path, language_hint)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock recognizer for testing.
pub struct MockRecognizer {
    model_name: String,
    language: String,
    segments: Vec<RecognitionSegment>,
    failures_remaining: AtomicU32,
}

impl MockRecognizer {
    /// Create a new mock recognizer with no segments.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            language: "en".to_string(),
            segments: Vec::new(),
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// Configure the segments returned by every successful call.
    pub fn with_segments(mut self, segments: Vec<RecognitionSegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the reported language.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Configure the mock to fail every call.
    pub fn with_failure(self) -> Self {
        self.with_failures(u32::MAX)
    }

    /// Configure the mock to fail the first `count` calls, then succeed.
    /// Used to exercise the pipeline's retry budget.
    pub fn with_failures(self, count: u32) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _audio_path: &Path, _language_hint: &str) -> Result<RecognitionOutput> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(TabscribeError::Recognition {
                message: "mock recognition failure".to_string(),
            });
        }

        let text = self
            .segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(RecognitionOutput {
            language: self.language.clone(),
            text,
            segments: self.segments.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn segment(start: f64, end: f64, text: &str) -> RecognitionSegment {
        RecognitionSegment {
            start,
            end,
            text: text.to_string(),
            no_speech_prob: 0.1,
        }
    }

    #[test]
    fn mock_returns_configured_segments() {
        let recognizer = MockRecognizer::new("test-model")
            .with_segments(vec![segment(0.0, 2.0, "hello"), segment(2.0, 4.0, "world")]);

        let output = recognizer
            .recognize(&PathBuf::from("a.wav"), "en")
            .unwrap();

        assert_eq!(output.segments.len(), 2);
        assert_eq!(output.text, "hello world");
        assert_eq!(output.language, "en");
    }

    #[test]
    fn mock_failure_returns_recognition_error() {
        let recognizer = MockRecognizer::new("test-model").with_failure();

        let result = recognizer.recognize(&PathBuf::from("a.wav"), "en");
        match result {
            Err(TabscribeError::Recognition { message }) => {
                assert_eq!(message, "mock recognition failure");
            }
            _ => panic!("Expected Recognition error"),
        }
    }

    #[test]
    fn mock_fail_n_times_then_succeeds() {
        let recognizer = MockRecognizer::new("test-model")
            .with_segments(vec![segment(0.0, 1.0, "ok")])
            .with_failures(2);
        let path = PathBuf::from("a.wav");

        assert!(recognizer.recognize(&path, "en").is_err());
        assert!(recognizer.recognize(&path, "en").is_err());
        assert!(recognizer.recognize(&path, "en").is_ok());
    }

    #[test]
    fn recognizer_trait_is_object_safe() {
        let recognizer: Box<dyn Recognizer> = Box::new(MockRecognizer::new("boxed"));
        assert_eq!(recognizer.model_name(), "boxed");
    }

    #[test]
    fn arc_recognizer_is_shareable() {
        let recognizer = Arc::new(
            MockRecognizer::new("shared").with_segments(vec![segment(0.0, 1.0, "hi")]),
        );
        let clone = Arc::clone(&recognizer);
        assert!(clone.recognize(&PathBuf::from("a.wav"), "en").is_ok());
    }
}
