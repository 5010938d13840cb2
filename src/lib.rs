//! tabscribe - Speaker-attributed transcripts from chunked tab recordings
//!
//! Reassembles an ordered stream of WAV chunks into one canonical file,
//! runs speech recognition and speaker diarization against it, and fuses
//! the two time-segmented outputs into a de-duplicated utterance sequence.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod chunks;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod diarize;
pub mod error;
pub mod fusion;
pub mod processor;
pub mod repo;
pub mod session;
pub mod stt;
pub mod wav;
pub mod worker;

// Core traits (chunk supply → engines → persistence)
pub use chunks::{Chunk, ChunkStore, FsChunkStore, MemoryChunkStore};
pub use diarize::{Diarization, Diarizer, MockDiarizer, NullDiarizer, SpeakerTurn};
pub use repo::{FsRepository, MemoryRepository, SessionRepository};
pub use stt::recognizer::{MockRecognizer, RecognitionOutput, RecognitionSegment, Recognizer};

// Pipeline
pub use processor::{ProcessingConfig, Processor};
pub use session::{ProcessingReport, SessionRecord, SessionStatus, Transcript, Utterance};

// Error handling
pub use error::{Result, TabscribeError};

// Config
pub use config::Config;
