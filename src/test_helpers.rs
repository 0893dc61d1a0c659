//! Shared test helpers: descriptor builders and a scriptable retriever.

use crate::error::FetchError;
use crate::retrieval::Retriever;
use crate::types::RepositoryDescriptor;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Build a descriptor for `owner/name` on github.com
pub(crate) fn repo(owner: &str, name: &str, stars: u64) -> RepositoryDescriptor {
    RepositoryDescriptor {
        name: name.to_string(),
        full_name: format!("{owner}/{name}"),
        clone_url: format!("https://github.com/{owner}/{name}.git"),
        stars,
        owner: owner.to_string(),
    }
}

/// How [`MockRetriever`] behaves on each call
#[derive(Clone, Copy, Debug)]
pub(crate) enum Behavior {
    /// Write a file and a `.git` directory, then succeed
    Succeed,
    /// Write a file, then report a non-zero exit
    FailAfterPartialWrite,
    /// Write a file, then sleep for the given duration before succeeding
    Hang(Duration),
    /// Succeed after a short delay
    Delay(Duration),
}

/// Retriever that records calls instead of running git
pub(crate) struct MockRetriever {
    behavior: Behavior,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    urls: Mutex<Vec<String>>,
    /// Repositories (by clone URL fragment) that fail regardless of behavior
    failing: Vec<String>,
}

impl MockRetriever {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            failing: Vec::new(),
        }
    }

    /// Make every URL containing one of `fragments` fail
    pub(crate) fn failing_for(mut self, fragments: &[&str]) -> Self {
        self.failing = fragments.iter().map(|f| f.to_string()).collect();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even when the future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn retrieve(&self, url: &str, dest: &Path, _depth: u32) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("README.md"), b"partial")?;

        if self.failing.iter().any(|f| url.contains(f.as_str())) {
            return Err(FetchError::ExitStatus {
                exit_code: Some(128),
                stderr: "fatal: repository not found".into(),
            });
        }

        match self.behavior {
            Behavior::Succeed => {
                std::fs::create_dir_all(dest.join(".git/objects"))?;
                std::fs::write(dest.join(".git/HEAD"), b"ref: refs/heads/main")?;
                Ok(())
            }
            Behavior::FailAfterPartialWrite => {
                std::fs::create_dir_all(dest.join("src/nested"))?;
                std::fs::write(dest.join("src/nested/lib.rs"), b"half")?;
                Err(FetchError::ExitStatus {
                    exit_code: Some(128),
                    stderr: format!("fatal: unable to access '{url}': connection reset"),
                })
            }
            Behavior::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Behavior::Delay(duration) => {
                tokio::time::sleep(duration).await;
                std::fs::create_dir_all(dest.join(".git"))?;
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
