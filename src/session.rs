//! Session and transcript records.
//!
//! A session is one continuous capture episode; it carries the status field
//! clients poll and the stats recorded by the pipeline. A transcript is the
//! immutable end product of one successful pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a recording session.
///
/// `Processing` is entered only once the engine stages begin; `Failed`
/// always carries a human-readable `processing_error` on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One recording session and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub status: SessionStatus,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    pub total_chunks: u64,
    pub total_duration_secs: f64,

    /// Path of the reassembled WAV, set once reassembly succeeds.
    pub audio_file: Option<String>,
    pub file_size: u64,

    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
}

impl SessionRecord {
    /// A fresh session in `Active` state.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            total_chunks: 0,
            total_duration_secs: 0.0,
            audio_file: None,
            file_size: 0,
            processing_started_at: None,
            processing_completed_at: None,
            processing_error: None,
        }
    }
}

/// One merged, speaker-labelled span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    /// Start time in seconds from the beginning of the recording.
    pub start: f64,
    /// End time in seconds; always greater than `start`.
    pub end: f64,
    pub confidence: f64,
    /// Position in the transcript, 0-based, ascending with start time.
    pub sequence_number: u64,
}

/// Final transcript of one session. Created once per successful pipeline
/// run; re-processing replaces the stored transcript wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub full_text: String,
    pub language: String,
    pub total_speakers: u64,
    pub total_utterances: u64,
    /// Mean utterance confidence; 0.0 when there are no utterances.
    pub confidence_avg: f64,
    /// Name of the recognition model that produced the segments.
    pub model: String,
    pub utterances: Vec<Utterance>,
}

impl Transcript {
    /// Derive a transcript from a fused utterance sequence.
    pub fn from_utterances(language: &str, model: &str, utterances: Vec<Utterance>) -> Self {
        let full_text = utterances
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut speakers: Vec<&str> = utterances.iter().map(|u| u.speaker.as_str()).collect();
        speakers.sort_unstable();
        speakers.dedup();

        let confidence_avg = if utterances.is_empty() {
            0.0
        } else {
            utterances.iter().map(|u| u.confidence).sum::<f64>() / utterances.len() as f64
        };

        Self {
            full_text,
            language: language.to_string(),
            total_speakers: speakers.len() as u64,
            total_utterances: utterances.len() as u64,
            confidence_avg,
            model: model.to_string(),
            utterances,
        }
    }
}

/// Summary returned by the orchestrator's `process` entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub total_speakers: u64,
    pub total_utterances: u64,
}
