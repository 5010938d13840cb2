//! Speech-to-text adapters.

pub mod recognizer;
pub mod whisper;

pub use recognizer::{MockRecognizer, RecognitionOutput, RecognitionSegment, Recognizer};
pub use whisper::{WhisperConfig, WhisperRecognizer};
