//! Serial processing worker.
//!
//! The recognition and diarization engines are expensive singletons and are
//! not assumed thread safe, so sessions queue up behind one worker thread
//! instead of sharing a loaded model concurrently. Different worker
//! processes may run in parallel; sessions share no mutable state.

use crate::processor::Processor;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// Handle to a running worker.
pub struct WorkerHandle {
    running: Arc<AtomicBool>,
    tx: Sender<Uuid>,
    thread: Option<JoinHandle<()>>,
}

/// Spawn a worker thread that processes queued sessions one at a time.
///
/// `queue_depth` bounds the backlog; `enqueue` fails once the queue is full
/// rather than buffering without limit.
pub fn spawn(processor: Arc<Processor>, queue_depth: usize) -> WorkerHandle {
    let (tx, rx) = bounded::<Uuid>(queue_depth);
    let running = Arc::new(AtomicBool::new(true));

    let thread_running = Arc::clone(&running);
    let thread = std::thread::spawn(move || {
        run_loop(processor, rx, thread_running);
    });

    WorkerHandle {
        running,
        tx,
        thread: Some(thread),
    }
}

fn run_loop(processor: Arc<Processor>, rx: Receiver<Uuid>, running: Arc<AtomicBool>) {
    info!("processing worker started");
    while running.load(Ordering::SeqCst) {
        // Senders dropping ends the loop; a timeout lets the running flag
        // be observed even with an idle queue.
        match rx.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(session_id) => {
                // Failures are recorded on the session by the processor;
                // the worker survives any single session's fault.
                if let Err(err) = processor.process(session_id) {
                    error!(session = %session_id, error = %err, "session processing failed");
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("processing worker stopped");
}

impl WorkerHandle {
    /// Queue a session for processing. Returns false if the queue is full
    /// or the worker has stopped.
    pub fn enqueue(&self, session_id: Uuid) -> bool {
        self.tx.try_send(session_id).is_ok()
    }

    /// Stop the worker after it finishes the session in flight.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if let Err(panic_info) = thread.join() {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic");
                error!("worker thread panicked: {msg}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{ChunkStore, MemoryChunkStore};
    use crate::diarize::MockDiarizer;
    use crate::processor::ProcessingConfig;
    use crate::repo::{MemoryRepository, SessionRepository};
    use crate::session::{SessionRecord, SessionStatus};
    use crate::stt::recognizer::{MockRecognizer, RecognitionSegment};
    use std::time::Duration;

    fn wait_for<F: Fn() -> bool>(predicate: F) {
        for _ in 0..100 {
            if predicate() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn worker_processes_queued_sessions_serially() {
        let chunks = Arc::new(MemoryChunkStore::new());
        let repo = Arc::new(MemoryRepository::new());
        let recordings = tempfile::tempdir().unwrap();

        let mut ids = Vec::new();
        for _ in 0..2 {
            let session = SessionRecord::new(Uuid::new_v4());
            repo.create(&session).unwrap();
            chunks.put_chunk(session.id, 0, &[0u8; 64]).unwrap();
            chunks.end_session(session.id).unwrap();
            ids.push(session.id);
        }

        let recognizer = MockRecognizer::new("base").with_segments(vec![RecognitionSegment {
            start: 0.0,
            end: 1.0,
            text: "queued".to_string(),
            no_speech_prob: 0.0,
        }]);
        let processor = Arc::new(Processor::new(
            Arc::clone(&chunks) as Arc<dyn ChunkStore>,
            Arc::clone(&repo) as Arc<dyn SessionRepository>,
            Arc::new(recognizer),
            Arc::new(MockDiarizer::new("none")),
            ProcessingConfig {
                recordings_dir: recordings.path().to_path_buf(),
                language: "en".to_string(),
                max_attempts: 1,
                retry_backoff: Duration::ZERO,
            },
        ));

        let worker = spawn(processor, 8);
        for &id in &ids {
            assert!(worker.enqueue(id));
        }

        wait_for(|| {
            ids.iter().all(|&id| {
                repo.fetch(id)
                    .map(|s| s.status == SessionStatus::Completed)
                    .unwrap_or(false)
            })
        });

        worker.stop();
    }

    #[test]
    fn enqueue_fails_when_queue_is_full() {
        let chunks = Arc::new(MemoryChunkStore::new());
        let repo = Arc::new(MemoryRepository::new());
        let recordings = tempfile::tempdir().unwrap();

        let slow_session = SessionRecord::new(Uuid::new_v4());
        repo.create(&slow_session).unwrap();
        chunks.put_chunk(slow_session.id, 0, &[0u8; 64]).unwrap();
        chunks.end_session(slow_session.id).unwrap();

        // Failing recognizer plus a long backoff keeps the worker busy on
        // the first session while the queue is filled behind it.
        let processor = Arc::new(Processor::new(
            Arc::clone(&chunks) as Arc<dyn ChunkStore>,
            Arc::clone(&repo) as Arc<dyn SessionRepository>,
            Arc::new(MockRecognizer::new("base").with_failure()),
            Arc::new(MockDiarizer::new("none")),
            ProcessingConfig {
                recordings_dir: recordings.path().to_path_buf(),
                language: "en".to_string(),
                max_attempts: 10,
                retry_backoff: Duration::from_millis(200),
            },
        ));

        let worker = spawn(processor, 1);
        assert!(worker.enqueue(slow_session.id));

        // Wait until the worker has taken the slow session off the queue.
        wait_for(|| {
            repo.fetch(slow_session.id)
                .map(|s| s.status == SessionStatus::Processing)
                .unwrap_or(false)
        });

        // Depth-1 queue: one more fits, the rest are rejected.
        let mut accepted = 0;
        for _ in 0..10 {
            if worker.enqueue(Uuid::new_v4()) {
                accepted += 1;
            }
        }
        assert!(accepted <= 1, "bounded queue must reject once full");
        worker.stop();
    }
}
