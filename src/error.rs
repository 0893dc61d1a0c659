//! Error types for repo-collector
//!
//! Errors are split by pipeline phase:
//! - [`SearchError`] - conditions that end repository discovery early
//! - [`FetchError`] - failures contained inside a single fetch task
//! - [`Error`] - run-level conditions surfaced to the caller
//!
//! Per-task errors never escape the worker pool; they are converted into
//! [`FetchStatus::Failed`](crate::types::FetchStatus) records instead.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for repo-collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for repo-collector
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or input error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the problem
        message: String,
        /// The configuration key or input field that caused the error
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Archive creation failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Build a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Conditions that stop search pagination
///
/// None of these fail a run. They truncate pagination and are kept on the
/// search results; [`SearchError::Auth`] additionally ends the search phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The credential was rejected (HTTP 401)
    #[error("credential rejected by the search API")]
    Auth,

    /// The API rate limit was hit (HTTP 403)
    #[error("search API rate limit exceeded on page {page}")]
    RateLimited {
        /// Page that was refused
        page: u32,
    },

    /// The API answered with an unexpected status
    #[error("search API returned status {status} on page {page}")]
    BadStatus {
        /// Page that failed
        page: u32,
        /// HTTP status code
        status: u16,
    },

    /// Transport failure (timeout, DNS, connection reset, undecodable body)
    #[error("transport error on page {page}: {message}")]
    Transport {
        /// Page that failed
        page: u32,
        /// Underlying error message
        message: String,
    },
}

impl SearchError {
    /// Whether the credential itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::Auth)
    }
}

/// Failures contained inside one fetch task
#[derive(Debug, Error)]
pub enum FetchError {
    /// The retrieval process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The retrieval process exited unsuccessfully
    #[error("clone exited with {}: {stderr}", describe_exit(*exit_code))]
    ExitStatus {
        /// Exit code, `None` if terminated by a signal
        exit_code: Option<i32>,
        /// Trimmed standard error of the process
        stderr: String,
    },

    /// The retrieval exceeded its wall-clock bound
    #[error("clone timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// The run was cancelled while the retrieval was in flight
    #[error("clone cancelled")]
    Cancelled,

    /// Another descriptor already owns the same workspace slot
    #[error("workspace slot {slot} already claimed by {claimed_by}")]
    SlotCollision {
        /// Sanitized slot name
        slot: String,
        /// Full name of the descriptor that owns the slot
        claimed_by: String,
    },

    /// Filesystem error inside the task's slot
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(exit_code: Option<i32>) -> String {
    exit_code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}
