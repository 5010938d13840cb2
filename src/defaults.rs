//! Default configuration constants for tabscribe.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Size of the canonical WAV container header in bytes.
///
/// Every chunk arriving from the capture side is a complete WAV file with a
/// fixed 44-byte RIFF header; reassembly strips this header from every chunk
/// after the first.
pub const WAV_HEADER_LEN: usize = 44;

/// Byte offset of the RIFF overall-size field (u32 little-endian).
pub const RIFF_SIZE_OFFSET: usize = 4;

/// Byte offset of the data-chunk-size field (u32 little-endian).
pub const DATA_SIZE_OFFSET: usize = 40;

/// RIFF overhead included in the overall-size field: the header minus the
/// 8-byte RIFF preamble (`"RIFF"` + size field itself).
pub const RIFF_OVERHEAD: u32 = 36;

/// Byte range of the fmt fields (audio format, channels, sample rate,
/// byte rate, block align, bits per sample) inside the 44-byte header.
///
/// Chunks of one session must agree on these bytes; mismatches are logged
/// rather than rejected since the stream cannot be re-captured.
pub const FMT_FIELDS: std::ops::Range<usize> = 20..36;

/// Speaker label assigned when diarization is unavailable or no turn
/// overlaps a recognition segment.
pub const FALLBACK_SPEAKER: &str = "SPEAKER_00";

/// Maximum silence between two same-speaker segments for them to be merged
/// into one utterance, in seconds.
pub const MERGE_GAP_SECS: f64 = 1.0;

/// Default number of attempts for the engine/persistence stages of the
/// pipeline before a session is marked failed.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default delay between pipeline attempts, in seconds.
pub const RETRY_BACKOFF_SECS: u64 = 60;

/// Default language hint passed to the recognition engine.
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Language value that lets the recognition engine detect the language.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default depth of the worker's session queue.
pub const QUEUE_DEPTH: usize = 16;
