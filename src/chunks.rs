//! Chunk storage for in-flight recording sessions.
//!
//! During capture each transport unit lands here as one chunk, keyed by its
//! sequence number. Reassembly must not start before the capture side has
//! signalled end of stream, and chunk writes are synced to disk before that
//! signal is accepted; a race here truncates the final recording.
//!
//! Chunks of one session are assumed to share a single WAV format (sample
//! rate, channels, bit depth). The store does not inspect payloads; the
//! reassembler logs format mismatches.

use crate::error::{Result, TabscribeError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// One ordered binary fragment of a session's audio stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence_number: u64,
    pub payload: Vec<u8>,
}

impl Chunk {
    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Storage for a session's audio chunks between capture and reassembly.
///
/// Implementations must return chunks sorted ascending by sequence number
/// regardless of arrival order, and must make `put_chunk` durable before a
/// subsequent `end_session` is observed.
pub trait ChunkStore: Send + Sync {
    /// Store one chunk. Sequence numbers are unique per session; storing the
    /// same number twice overwrites the earlier payload.
    fn put_chunk(&self, session: Uuid, sequence_number: u64, payload: &[u8]) -> Result<()>;

    /// Record the end-of-stream signal for a session.
    fn end_session(&self, session: Uuid) -> Result<()>;

    /// Whether the end-of-stream signal has been observed.
    fn is_ended(&self, session: Uuid) -> bool;

    /// Load all chunks of a session, sorted ascending by sequence number.
    fn load_chunks(&self, session: Uuid) -> Result<Vec<Chunk>>;

    /// Delete a session's chunk storage. Called only after the transcript
    /// has been persisted; a failed pipeline keeps its chunks for the retry.
    fn purge(&self, session: Uuid) -> Result<()>;
}

/// Filesystem-backed chunk store.
///
/// Layout: `<root>/<session>/chunk_<seq>.wav` plus an `ended` marker file.
pub struct FsChunkStore {
    root: PathBuf,
}

const ENDED_MARKER: &str = "ended";

impl FsChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session: Uuid) -> PathBuf {
        self.root.join(session.to_string())
    }

    fn chunk_path(&self, session: Uuid, sequence_number: u64) -> PathBuf {
        self.session_dir(session)
            .join(format!("chunk_{:08}.wav", sequence_number))
    }

    fn parse_sequence_number(path: &Path) -> Option<u64> {
        path.file_stem()?
            .to_str()?
            .strip_prefix("chunk_")?
            .parse()
            .ok()
    }
}

impl ChunkStore for FsChunkStore {
    fn put_chunk(&self, session: Uuid, sequence_number: u64, payload: &[u8]) -> Result<()> {
        let dir = self.session_dir(session);
        fs::create_dir_all(&dir)?;

        // Write and sync before returning: the end-of-stream signal may be
        // processed immediately after this call, and reassembly must see the
        // complete payload.
        let path = self.chunk_path(session, sequence_number);
        let mut file = File::create(&path)?;
        file.write_all(payload)?;
        file.sync_all()?;

        debug!(
            session = %session,
            sequence_number,
            bytes = payload.len(),
            "chunk stored"
        );
        Ok(())
    }

    fn end_session(&self, session: Uuid) -> Result<()> {
        let dir = self.session_dir(session);
        fs::create_dir_all(&dir)?;
        let file = File::create(dir.join(ENDED_MARKER))?;
        file.sync_all()?;
        Ok(())
    }

    fn is_ended(&self, session: Uuid) -> bool {
        self.session_dir(session).join(ENDED_MARKER).exists()
    }

    fn load_chunks(&self, session: Uuid) -> Result<Vec<Chunk>> {
        let dir = self.session_dir(session);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(sequence_number) = Self::parse_sequence_number(&path) else {
                continue; // marker file or stray content
            };
            let payload = fs::read(&path)?;
            chunks.push(Chunk {
                sequence_number,
                payload,
            });
        }

        // Directory order is arbitrary; reassembly order is by sequence number.
        chunks.sort_by_key(|c| c.sequence_number);
        Ok(chunks)
    }

    fn purge(&self, session: Uuid) -> Result<()> {
        let dir = self.session_dir(session);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| TabscribeError::ChunkStore {
                message: format!("Failed to purge chunks for {}: {}", session, e),
            })?;
        }
        Ok(())
    }
}

/// In-memory chunk store for tests.
#[derive(Default)]
pub struct MemoryChunkStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    chunks: HashMap<Uuid, BTreeMap<u64, Vec<u8>>>,
    ended: HashSet<Uuid>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|e| TabscribeError::ChunkStore {
            message: format!("Chunk store lock poisoned: {}", e),
        })
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put_chunk(&self, session: Uuid, sequence_number: u64, payload: &[u8]) -> Result<()> {
        self.lock()?
            .chunks
            .entry(session)
            .or_default()
            .insert(sequence_number, payload.to_vec());
        Ok(())
    }

    fn end_session(&self, session: Uuid) -> Result<()> {
        self.lock()?.ended.insert(session);
        Ok(())
    }

    fn is_ended(&self, session: Uuid) -> bool {
        self.lock().map(|g| g.ended.contains(&session)).unwrap_or(false)
    }

    fn load_chunks(&self, session: Uuid) -> Result<Vec<Chunk>> {
        Ok(self
            .lock()?
            .chunks
            .get(&session)
            .map(|by_seq| {
                by_seq
                    .iter()
                    .map(|(&sequence_number, payload)| Chunk {
                        sequence_number,
                        payload: payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn purge(&self, session: Uuid) -> Result<()> {
        let mut guard = self.lock()?;
        guard.chunks.remove(&session);
        guard.ended.remove(&session);
        Ok(())
    }
}
