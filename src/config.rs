//! TOML configuration for the tabscribe pipeline.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub stt: SttConfig,
    pub processing: ProcessingSettings,
}

/// Storage layout configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; chunks, recordings, sessions and transcripts live
    /// in subdirectories below it.
    pub root: PathBuf,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language hint ("auto" lets the engine detect)
    pub language: String,
}

/// Pipeline retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingSettings {
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
    pub queue_depth: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_backoff_secs: defaults::RETRY_BACKOFF_SECS,
            queue_depth: defaults::QUEUE_DEPTH,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file
    /// doesn't exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TABSCRIBE_MODEL → stt.model_path
    /// - TABSCRIBE_LANGUAGE → stt.language
    /// - TABSCRIBE_STORAGE_ROOT → storage.root
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("TABSCRIBE_MODEL") {
            if !model.is_empty() {
                self.stt.model_path = PathBuf::from(model);
            }
        }
        if let Ok(language) = std::env::var("TABSCRIBE_LANGUAGE") {
            if !language.is_empty() {
                self.stt.language = language;
            }
        }
        if let Ok(root) = std::env::var("TABSCRIBE_STORAGE_ROOT") {
            if !root.is_empty() {
                self.storage.root = PathBuf::from(root);
            }
        }
        self
    }

    /// Chunk storage directory under the storage root.
    pub fn chunks_dir(&self) -> PathBuf {
        self.storage.root.join("chunks")
    }

    /// Reassembled recordings directory under the storage root.
    pub fn recordings_dir(&self) -> PathBuf {
        self.storage.root.join("recordings")
    }
}
