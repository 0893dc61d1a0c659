//! Core types and events for repo-collector

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default number of repositories when the requested count cannot be parsed
pub const DEFAULT_COUNT: usize = 10;

/// One repository discovered by the search API
///
/// Immutable once produced by the search client. Two descriptors are the
/// same repository when their `full_name` matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Short repository name
    pub name: String,
    /// Fully-qualified identifier (`owner/name`), the uniqueness key
    pub full_name: String,
    /// HTTPS clone endpoint
    pub clone_url: String,
    /// Popularity (stargazer count)
    pub stars: u64,
    /// Owner login
    pub owner: String,
}

impl RepositoryDescriptor {
    /// Name of the workspace subdirectory this repository is cloned into
    ///
    /// Built from `<name>_<owner>` and sanitized for use as a path component.
    pub fn slot_name(&self) -> String {
        crate::workspace::sanitize(&format!("{}_{}", self.name, self.owner))
    }
}

/// Static access token presented to the forge
///
/// The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, returning `None` for blank input
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// The raw token value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The user's search request, read-only after construction
#[derive(Clone, Debug)]
pub struct SearchQuery {
    text: String,
    count: usize,
    credential: Option<Credential>,
}

impl SearchQuery {
    /// Build a query, rejecting empty text and a zero count
    pub fn new(
        text: impl Into<String>,
        count: usize,
        credential: Option<Credential>,
    ) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(Error::config("query", "search text must not be empty"));
        }
        if count == 0 {
            return Err(Error::config("count", "requested count must be positive"));
        }
        Ok(Self {
            text,
            count,
            credential,
        })
    }

    /// Free-text search string
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Maximum number of repositories to collect
    pub fn count(&self) -> usize {
        self.count
    }

    /// Optional access token
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

/// Why a fetch task did nothing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The target directory was already present
    AlreadyExists,
}

/// Terminal state of one fetch task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FetchStatus {
    /// Repository materialized in its slot
    Success,
    /// Nothing was done
    Skipped(SkipReason),
    /// Retrieval failed; the slot was rolled back
    Failed(String),
}

impl FetchStatus {
    /// Whether this status is [`FetchStatus::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Success)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Success => f.write_str("success"),
            FetchStatus::Skipped(SkipReason::AlreadyExists) => {
                f.write_str("skipped (already exists)")
            }
            FetchStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of one fetch task, produced exactly once per descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// The repository this outcome belongs to
    pub descriptor: RepositoryDescriptor,
    /// What happened
    pub status: FetchStatus,
    /// Slot the task targeted
    pub target: PathBuf,
}

/// Snapshot of pool progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Tasks scheduled
    pub total: usize,
    /// Tasks finished (any status)
    pub completed: usize,
    /// Tasks finished with success
    pub succeeded: usize,
    /// Tasks skipped
    pub skipped: usize,
    /// Tasks failed
    pub failed: usize,
}

impl Progress {
    /// Whether every scheduled task has finished
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A search page was received
    SearchPage {
        /// 1-based page number
        page: u32,
        /// Items on this page
        items: usize,
        /// Items accumulated so far
        accumulated: usize,
    },

    /// Pagination stopped because of an API or transport condition
    SearchInterrupted {
        /// Human-readable reason
        reason: String,
    },

    /// Search finished
    SearchComplete {
        /// Descriptors kept after dedupe/sort/truncate
        found: usize,
    },

    /// A fetch task started its retrieval
    FetchStarted {
        /// Repository full name
        full_name: String,
    },

    /// A fetch task finished
    FetchFinished {
        /// Repository full name
        full_name: String,
        /// Terminal status
        status: FetchStatus,
        /// Aggregate progress after this task
        progress: Progress,
    },

    /// The run was interrupted
    Cancelled {
        /// Progress at the time of cancellation
        progress: Progress,
    },

    /// Manifest written
    ManifestWritten {
        /// Manifest location
        path: PathBuf,
    },

    /// Archive created
    ArchiveCreated {
        /// Archive location
        path: PathBuf,
    },
}
