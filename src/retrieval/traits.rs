//! The retrieval seam used by fetch tasks

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;

/// Transfers one repository snapshot into a local directory
///
/// Implementations must be cancel-safe: when the returned future is dropped
/// (timeout or run cancellation) any child process has to be terminated.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Clone `url` into `dest`, keeping at most `depth` commits of history
    ///
    /// `dest` does not exist when this is called. On error the caller removes
    /// whatever was written.
    async fn retrieve(&self, url: &str, dest: &Path, depth: u32) -> Result<(), FetchError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
