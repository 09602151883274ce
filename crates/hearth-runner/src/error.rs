//! Error types for skill process invocations

use std::time::Duration;
use thiserror::Error;

/// Skill process errors
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The process could not be started
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        /// Program that failed to start
        command: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The process wrote to its standard error
    #[error("Skill wrote to stderr: {0}")]
    Stderr(String),

    /// The process exited with a non-zero status, or was killed by a signal
    #[error("Skill exited abnormally (code {code:?})")]
    ExitStatus {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// The process exceeded the configured timeout and was killed
    #[error("Skill timed out after {0:?}")]
    Timeout(Duration),

    /// The stream ended without a single valid result line
    #[error("Skill produced no result")]
    NoResult,

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Whether the failure is a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, RunnerError>;
