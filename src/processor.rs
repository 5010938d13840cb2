//! Per-session processing orchestrator.
//!
//! Drives one session through reassembly → recognition → diarization →
//! fusion → persistence, owns the session's status transitions and the
//! retry policy.
//!
//! Reassembly runs exactly once and its output file is the retry
//! checkpoint: the engine and persistence stages are retried against the
//! already-reassembled WAV, and chunk storage is purged only after the
//! transcript has been persisted. A retry can therefore never find its
//! chunks deleted by an earlier attempt.

use crate::chunks::ChunkStore;
use crate::defaults;
use crate::diarize::{Diarization, Diarizer};
use crate::error::{Result, TabscribeError};
use crate::fusion::fuse;
use crate::repo::SessionRepository;
use crate::session::{ProcessingReport, SessionRecord, SessionStatus, Transcript};
use crate::stt::recognizer::Recognizer;
use crate::wav;
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Directory for reassembled recordings.
    pub recordings_dir: PathBuf,
    /// Language hint passed to the recognition engine.
    pub language: String,
    /// Attempt budget for the engine/persistence stages.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_backoff: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_backoff: Duration::from_secs(defaults::RETRY_BACKOFF_SECS),
        }
    }
}

/// Sequences the pipeline for one session at a time.
///
/// The engine handles are shared singletons (models load once per worker
/// process); each engine serializes its own inference internally.
pub struct Processor {
    chunks: Arc<dyn ChunkStore>,
    repo: Arc<dyn SessionRepository>,
    recognizer: Arc<dyn Recognizer>,
    diarizer: Arc<dyn Diarizer>,
    config: ProcessingConfig,
}

impl Processor {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        repo: Arc<dyn SessionRepository>,
        recognizer: Arc<dyn Recognizer>,
        diarizer: Arc<dyn Diarizer>,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            chunks,
            repo,
            recognizer,
            diarizer,
            config,
        }
    }

    /// Process one session end to end.
    ///
    /// Idempotent in intent: callable from any dispatch mechanism. Errors
    /// that mark the session `failed` are also returned so the caller sees
    /// the same failure the record carries.
    pub fn process(&self, session_id: Uuid) -> Result<ProcessingReport> {
        let mut session = self.repo.fetch(session_id)?;

        // Reassembly must not start before the capture side has signalled
        // end of stream; chunks may still be arriving.
        if !self.chunks.is_ended(session_id) {
            return Err(TabscribeError::SessionNotEnded {
                id: session_id.to_string(),
            });
        }

        info!(session = %session_id, "starting audio processing");
        session.status = SessionStatus::Processing;
        session.processing_started_at = Some(Utc::now());
        self.repo.update(&session)?;

        let chunks = match self.chunks.load_chunks(session_id) {
            Ok(chunks) if chunks.is_empty() => {
                let err = TabscribeError::NoChunks {
                    id: session_id.to_string(),
                };
                self.fail_session(&mut session, &err);
                return Err(err);
            }
            Ok(chunks) => chunks,
            Err(err) => {
                self.fail_session(&mut session, &err);
                return Err(err);
            }
        };

        // Stage 1: reassemble once. The written file is the checkpoint all
        // retries start from; chunk storage stays intact until persistence
        // has committed.
        let audio_path = match self.reassemble_to_file(&mut session, &chunks) {
            Ok(path) => path,
            Err(err) => {
                self.fail_session(&mut session, &err);
                return Err(err);
            }
        };

        // Stages 2-5 under the retry budget.
        let transcript = match self.run_engine_stages(session_id, &audio_path) {
            Ok(transcript) => transcript,
            Err(err) => {
                self.fail_session(&mut session, &err);
                return Err(err);
            }
        };

        session.status = SessionStatus::Completed;
        session.processing_completed_at = Some(Utc::now());
        self.repo.update(&session)?;

        // Destructive cleanup happens last. A purge failure leaves stray
        // files but the transcript is already committed, so only warn.
        if let Err(err) = self.chunks.purge(session_id) {
            warn!(session = %session_id, error = %err, "failed to purge chunk storage");
        }

        info!(
            session = %session_id,
            total_speakers = transcript.total_speakers,
            total_utterances = transcript.total_utterances,
            "audio processing completed"
        );

        Ok(ProcessingReport {
            session_id,
            status: SessionStatus::Completed,
            total_speakers: transcript.total_speakers,
            total_utterances: transcript.total_utterances,
        })
    }

    /// Reassemble the chunk payloads, write the canonical WAV, and record
    /// the file stats on the session.
    fn reassemble_to_file(
        &self,
        session: &mut SessionRecord,
        chunks: &[crate::chunks::Chunk],
    ) -> Result<PathBuf> {
        info!(session = %session.id, chunks = chunks.len(), "reassembling chunks");

        let payloads: Vec<Vec<u8>> = chunks.iter().map(|c| c.payload.clone()).collect();
        let merged = wav::reassemble(&payloads);

        fs::create_dir_all(&self.config.recordings_dir)?;
        let filename = format!(
            "recording_{}_{}.wav",
            session.started_at.format("%Y%m%d_%H%M%S"),
            &session.id.to_string()[..8]
        );
        let path = self.config.recordings_dir.join(filename);

        let mut file = File::create(&path)?;
        file.write_all(&merged)?;
        file.sync_all()?;

        session.total_chunks = chunks.len() as u64;
        session.audio_file = Some(path.to_string_lossy().to_string());
        session.file_size = merged.len() as u64;
        match wav::probe_duration_secs(&path) {
            Ok(secs) => session.total_duration_secs = secs,
            // Recognition will reject a truly unreadable file; a failed
            // probe alone should not kill the session.
            Err(err) => warn!(session = %session.id, error = %err, "could not probe duration"),
        }
        self.repo.update(session)?;

        info!(
            session = %session.id,
            file = %path.display(),
            bytes = merged.len(),
            "audio file created"
        );
        Ok(path)
    }

    /// Recognition → diarization → fusion → persistence, with bounded
    /// retries and fixed backoff. Diarization failure never fails the
    /// pipeline; it degrades to the single-speaker fallback inside `fuse`.
    fn run_engine_stages(&self, session_id: Uuid, audio_path: &std::path::Path) -> Result<Transcript> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_engine_stages(session_id, audio_path) {
                Ok(transcript) => return Ok(transcript),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    warn!(
                        session = %session_id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "pipeline attempt failed, retrying"
                    );
                    std::thread::sleep(self.config.retry_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn try_engine_stages(&self, session_id: Uuid, audio_path: &std::path::Path) -> Result<Transcript> {
        info!(session = %session_id, stage = "recognition", model = self.recognizer.model_name(), "running speech recognition");
        let recognition = self.recognizer.recognize(audio_path, &self.config.language)?;

        info!(session = %session_id, stage = "diarization", model = self.diarizer.model_name(), "running speaker diarization");
        let diarization = self.diarizer.diarize(audio_path);
        if let Diarization::Unavailable { reason } = &diarization {
            warn!(session = %session_id, reason = %reason, "diarization unavailable, continuing without speakers");
        }

        info!(session = %session_id, stage = "fusion", segments = recognition.segments.len(), "merging recognition and diarization");
        let utterances = fuse(&recognition.segments, &diarization);

        let language = if recognition.language.is_empty() {
            self.config.language.clone()
        } else {
            recognition.language.clone()
        };
        let transcript =
            Transcript::from_utterances(&language, self.recognizer.model_name(), utterances);

        info!(session = %session_id, stage = "persistence", utterances = transcript.total_utterances, "saving transcript");
        self.repo.save_transcript(session_id, &transcript)?;

        Ok(transcript)
    }

    /// Record a terminal failure on the session. Best-effort: a failing
    /// status write is logged, the original error still propagates.
    fn fail_session(&self, session: &mut SessionRecord, err: &TabscribeError) {
        error!(session = %session.id, error = %err, "audio processing failed");
        session.status = SessionStatus::Failed;
        session.processing_error = Some(err.to_string());
        session.processing_completed_at = Some(Utc::now());
        if let Err(update_err) = self.repo.update(session) {
            error!(
                session = %session.id,
                error = %update_err,
                "failed to record session failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::MemoryChunkStore;
    use crate::diarize::{MockDiarizer, SpeakerTurn};
    use crate::repo::MemoryRepository;
    use crate::stt::recognizer::{MockRecognizer, RecognitionSegment};
    use std::io::Cursor;

    fn make_wav_data(samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn segment(start: f64, end: f64, text: &str) -> RecognitionSegment {
        RecognitionSegment {
            start,
            end,
            text: text.to_string(),
            no_speech_prob: 0.1,
        }
    }

    struct Fixture {
        chunks: Arc<MemoryChunkStore>,
        repo: Arc<MemoryRepository>,
        recordings: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                chunks: Arc::new(MemoryChunkStore::new()),
                repo: Arc::new(MemoryRepository::new()),
                recordings: tempfile::tempdir().unwrap(),
            }
        }

        fn config(&self, max_attempts: u32) -> ProcessingConfig {
            ProcessingConfig {
                recordings_dir: self.recordings.path().to_path_buf(),
                language: "en".to_string(),
                max_attempts,
                retry_backoff: Duration::ZERO,
            }
        }

        fn processor(
            &self,
            recognizer: MockRecognizer,
            diarizer: MockDiarizer,
            max_attempts: u32,
        ) -> Processor {
            Processor::new(
                Arc::clone(&self.chunks) as Arc<dyn ChunkStore>,
                Arc::clone(&self.repo) as Arc<dyn SessionRepository>,
                Arc::new(recognizer),
                Arc::new(diarizer),
                self.config(max_attempts),
            )
        }

        fn seed_session(&self, chunk_count: usize, ended: bool) -> Uuid {
            let session = SessionRecord::new(Uuid::new_v4());
            self.repo.create(&session).unwrap();
            for seq in 0..chunk_count {
                self.chunks
                    .put_chunk(session.id, seq as u64, &make_wav_data(&[100i16; 1600]))
                    .unwrap();
            }
            if ended {
                self.chunks.end_session(session.id).unwrap();
            }
            session.id
        }
    }

    #[test]
    fn happy_path_completes_session_and_purges_chunks() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(3, true);

        let recognizer = MockRecognizer::new("base")
            .with_segments(vec![segment(0.0, 1.0, "hello"), segment(1.2, 2.0, "world")]);
        let diarizer = MockDiarizer::new("pyannote").with_turns(vec![SpeakerTurn {
            start: 0.0,
            end: 2.0,
            speaker: "SPEAKER_01".to_string(),
        }]);

        let report = fixture.processor(recognizer, diarizer, 3).process(id).unwrap();

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.total_speakers, 1);
        assert_eq!(report.total_utterances, 1); // merged across the 0.2s gap

        let session = fixture.repo.fetch(id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.total_chunks, 3);
        assert!(session.audio_file.is_some());
        assert!(session.file_size > 0);
        assert!(session.total_duration_secs > 0.0);
        assert!(session.processing_started_at.is_some());
        assert!(session.processing_completed_at.is_some());

        let transcript = fixture.repo.load_transcript(id).unwrap().unwrap();
        assert_eq!(transcript.full_text, "hello world");
        assert_eq!(transcript.utterances[0].speaker, "SPEAKER_01");

        // Destructive cleanup only after success
        assert!(fixture.chunks.load_chunks(id).unwrap().is_empty());
    }

    #[test]
    fn diarization_unavailable_degrades_to_fallback_speaker() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(1, true);

        let recognizer =
            MockRecognizer::new("base").with_segments(vec![segment(0.0, 1.0, "solo")]);
        let diarizer = MockDiarizer::new("pyannote").with_unavailable("engine crashed");

        let report = fixture.processor(recognizer, diarizer, 3).process(id).unwrap();
        assert_eq!(report.status, SessionStatus::Completed);

        let transcript = fixture.repo.load_transcript(id).unwrap().unwrap();
        assert_eq!(transcript.utterances[0].speaker, "SPEAKER_00");
    }

    #[test]
    fn empty_session_is_marked_failed_with_descriptive_error() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(0, true);

        let result = fixture
            .processor(MockRecognizer::new("base"), MockDiarizer::new("none"), 3)
            .process(id);

        assert!(matches!(result, Err(TabscribeError::NoChunks { .. })));
        let session = fixture.repo.fetch(id).unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(
            session
                .processing_error
                .as_deref()
                .unwrap_or("")
                .contains("No chunks to process")
        );
    }

    #[test]
    fn session_without_end_signal_is_refused_untouched() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(2, false);

        let result = fixture
            .processor(MockRecognizer::new("base"), MockDiarizer::new("none"), 3)
            .process(id);

        assert!(matches!(result, Err(TabscribeError::SessionNotEnded { .. })));
        // Still capturing: status must not move to processing/failed.
        let session = fixture.repo.fetch(id).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn unknown_session_is_an_error() {
        let fixture = Fixture::new();
        let result = fixture
            .processor(MockRecognizer::new("base"), MockDiarizer::new("none"), 3)
            .process(Uuid::new_v4());
        assert!(matches!(result, Err(TabscribeError::SessionNotFound { .. })));
    }

    #[test]
    fn recognition_failure_exhausts_retries_and_keeps_chunks() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(2, true);

        let recognizer = MockRecognizer::new("base").with_failure();
        let result = fixture
            .processor(recognizer, MockDiarizer::new("none"), 2)
            .process(id);

        assert!(matches!(result, Err(TabscribeError::Recognition { .. })));

        let session = fixture.repo.fetch(id).unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(
            session
                .processing_error
                .as_deref()
                .unwrap_or("")
                .contains("mock recognition failure")
        );

        // Chunks survive a failed pipeline so a retry can re-run it.
        assert_eq!(fixture.chunks.load_chunks(id).unwrap().len(), 2);
    }

    #[test]
    fn transient_recognition_failure_is_retried_within_budget() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(1, true);

        let recognizer = MockRecognizer::new("base")
            .with_segments(vec![segment(0.0, 1.0, "eventually")])
            .with_failures(1);

        let report = fixture
            .processor(recognizer, MockDiarizer::new("none"), 3)
            .process(id)
            .unwrap();

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.total_utterances, 1);
    }

    #[test]
    fn transient_persistence_failure_is_retried() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(1, true);
        fixture.repo.fail_next_transcript_saves(1);

        let recognizer =
            MockRecognizer::new("base").with_segments(vec![segment(0.0, 1.0, "saved")]);

        let report = fixture
            .processor(recognizer, MockDiarizer::new("none"), 3)
            .process(id)
            .unwrap();

        assert_eq!(report.status, SessionStatus::Completed);
        assert!(fixture.repo.load_transcript(id).unwrap().is_some());
    }

    #[test]
    fn detected_language_overrides_hint_on_transcript() {
        let fixture = Fixture::new();
        let id = fixture.seed_session(1, true);

        let recognizer = MockRecognizer::new("base")
            .with_segments(vec![segment(0.0, 1.0, "privet")])
            .with_language("ru");

        fixture
            .processor(recognizer, MockDiarizer::new("none"), 3)
            .process(id)
            .unwrap();

        let transcript = fixture.repo.load_transcript(id).unwrap().unwrap();
        assert_eq!(transcript.language, "ru");
    }
}
