//! Error types for the convergence tracker
//!
//! Probe failures never surface here: metric sources degrade them to a
//! zero reading. These variants cover configuration, setup, external
//! commands and result indexing.

use thiserror::Error;

/// Main error type for the tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// External command could not be run or reported failure
    #[error("Command `{program}` failed: {reason}")]
    CommandFailed { program: String, reason: String },

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Command output or log text did not have the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Host preparation failed before detection could start
    #[error("Setup failed: {0}")]
    SetupError(String),

    /// Index backend rejected a document
    #[error("Indexing into `{index}` failed with status {status}: {body}")]
    IndexError {
        index: String,
        status: u16,
        body: String,
    },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Tracker error: {0}")]
    Generic(String),
}

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Convert anyhow errors to TrackerError
impl From<anyhow::Error> for TrackerError {
    fn from(err: anyhow::Error) -> Self {
        TrackerError::Generic(err.to_string())
    }
}
