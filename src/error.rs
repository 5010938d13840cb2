//! Error types for tabscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Chunk storage errors
    #[error("Chunk store error: {message}")]
    ChunkStore { message: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Session {id} has not signalled end of stream")]
    SessionNotEnded { id: String },

    #[error("No chunks to process for session {id}")]
    NoChunks { id: String },

    // Reassembly errors
    #[error("Reassembly failed: {message}")]
    Reassembly { message: String },

    // Recognition errors
    #[error("Recognition model not found at {path}")]
    RecognitionModelNotFound { path: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Persistence errors
    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl TabscribeError {
    /// Whether the pipeline should retry after this error.
    ///
    /// Input defects (missing session, empty chunk set, no end-of-stream
    /// signal, bad configuration) will not heal on their own; engine,
    /// persistence and I/O failures may be transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            TabscribeError::ConfigFileNotFound { .. }
            | TabscribeError::ConfigParse { .. }
            | TabscribeError::Config(_)
            | TabscribeError::SessionNotFound { .. }
            | TabscribeError::SessionNotEnded { .. }
            | TabscribeError::NoChunks { .. }
            | TabscribeError::RecognitionModelNotFound { .. }
            | TabscribeError::Reassembly { .. } => false,
            TabscribeError::ChunkStore { .. }
            | TabscribeError::Recognition { .. }
            | TabscribeError::Persistence { .. }
            | TabscribeError::Io(_)
            | TabscribeError::Other(_) => true,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TabscribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_session_not_found_display() {
        let error = TabscribeError::SessionNotFound {
            id: "b2c3".to_string(),
        };
        assert_eq!(error.to_string(), "Session not found: b2c3");
    }

    #[test]
    fn test_no_chunks_display() {
        let error = TabscribeError::NoChunks {
            id: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "No chunks to process for session abc");
    }

    #[test]
    fn test_recognition_display() {
        let error = TabscribeError::Recognition {
            message: "engine unavailable".to_string(),
        };
        assert_eq!(error.to_string(), "Recognition failed: engine unavailable");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: TabscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: TabscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_input_defects_are_not_retryable() {
        assert!(!TabscribeError::NoChunks {
            id: "x".to_string()
        }
        .is_retryable());
        assert!(!TabscribeError::SessionNotEnded {
            id: "x".to_string()
        }
        .is_retryable());
        assert!(!TabscribeError::SessionNotFound {
            id: "x".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_engine_and_io_failures_are_retryable() {
        assert!(TabscribeError::Recognition {
            message: "oom".to_string()
        }
        .is_retryable());
        assert!(TabscribeError::Persistence {
            message: "disk full".to_string()
        }
        .is_retryable());
        let io_error = io::Error::new(io::ErrorKind::Interrupted, "hiccup");
        assert!(TabscribeError::from(io_error).is_retryable());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<TabscribeError>();
        assert_sync::<TabscribeError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
