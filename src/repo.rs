//! Session and transcript persistence.
//!
//! The pipeline only needs a small record-store contract: fetch and update
//! session records, and persist one transcript per session. The filesystem
//! implementation keeps JSON documents; tests use the in-memory one.

use crate::error::{Result, TabscribeError};
use crate::session::{SessionRecord, Transcript};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub trait SessionRepository: Send + Sync {
    /// Insert a new session record.
    fn create(&self, session: &SessionRecord) -> Result<()>;

    /// Fetch a session record by id.
    fn fetch(&self, id: Uuid) -> Result<SessionRecord>;

    /// Overwrite the stored record for `session.id`.
    fn update(&self, session: &SessionRecord) -> Result<()>;

    /// Persist the transcript of a session. Replaces any existing transcript
    /// for that session: re-processing produces a fresh one and the session
    /// keeps exactly one current transcript.
    fn save_transcript(&self, session_id: Uuid, transcript: &Transcript) -> Result<()>;

    /// Load the persisted transcript of a session, if any.
    fn load_transcript(&self, session_id: Uuid) -> Result<Option<Transcript>>;
}

/// Filesystem-backed repository.
///
/// Layout: `<root>/sessions/<id>.json` and `<root>/transcripts/<id>.json`.
pub struct FsRepository {
    root: PathBuf,
}

impl FsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.root.join("sessions").join(format!("{}.json", id))
    }

    fn transcript_path(&self, id: Uuid) -> PathBuf {
        self.root.join("transcripts").join(format!("{}.json", id))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(value).map_err(|e| TabscribeError::Persistence {
            message: format!("Failed to serialize {}: {}", path.display(), e),
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl SessionRepository for FsRepository {
    fn create(&self, session: &SessionRecord) -> Result<()> {
        self.write_json(&self.session_path(session.id), session)
    }

    fn fetch(&self, id: Uuid) -> Result<SessionRecord> {
        let path = self.session_path(id);
        let data = fs::read(&path).map_err(|_| TabscribeError::SessionNotFound {
            id: id.to_string(),
        })?;
        serde_json::from_slice(&data).map_err(|e| TabscribeError::Persistence {
            message: format!("Corrupt session record {}: {}", path.display(), e),
        })
    }

    fn update(&self, session: &SessionRecord) -> Result<()> {
        self.write_json(&self.session_path(session.id), session)
    }

    fn save_transcript(&self, session_id: Uuid, transcript: &Transcript) -> Result<()> {
        self.write_json(&self.transcript_path(session_id), transcript)
    }

    fn load_transcript(&self, session_id: Uuid) -> Result<Option<Transcript>> {
        let path = self.transcript_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        let transcript =
            serde_json::from_slice(&data).map_err(|e| TabscribeError::Persistence {
                message: format!("Corrupt transcript {}: {}", path.display(), e),
            })?;
        Ok(Some(transcript))
    }
}

/// In-memory repository for tests.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<Uuid, SessionRecord>,
    transcripts: HashMap<Uuid, Transcript>,
    fail_transcript_saves: u32,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` transcript saves fail, for retry tests.
    pub fn fail_next_transcript_saves(&self, count: u32) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.fail_transcript_saves = count;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|e| TabscribeError::Persistence {
            message: format!("Repository lock poisoned: {}", e),
        })
    }
}

impl SessionRepository for MemoryRepository {
    fn create(&self, session: &SessionRecord) -> Result<()> {
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn fetch(&self, id: Uuid) -> Result<SessionRecord> {
        self.lock()?
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| TabscribeError::SessionNotFound { id: id.to_string() })
    }

    fn update(&self, session: &SessionRecord) -> Result<()> {
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn save_transcript(&self, session_id: Uuid, transcript: &Transcript) -> Result<()> {
        let mut guard = self.lock()?;
        if guard.fail_transcript_saves > 0 {
            guard.fail_transcript_saves -= 1;
            return Err(TabscribeError::Persistence {
                message: "injected transcript save failure".to_string(),
            });
        }
        guard.transcripts.insert(session_id, transcript.clone());
        Ok(())
    }

    fn load_transcript(&self, session_id: Uuid) -> Result<Option<Transcript>> {
        Ok(self.lock()?.transcripts.get(&session_id).cloned())
    }
}
