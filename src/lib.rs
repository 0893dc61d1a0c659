//! # repo-collector
//!
//! Search a code forge for repositories, shallow-clone the best matches in
//! parallel, and package them with a manifest into a single zip archive.
//!
//! ## Design Philosophy
//!
//! - **Bounded** - a fixed worker pool and a hard timeout on every clone
//! - **Isolated failures** - one bad repository never aborts the batch
//! - **Event-driven** - consumers subscribe to progress events
//! - **Configurable** - every constant lives in [`Config`] with a default
//!
//! ## Quick Start
//!
//! ```no_run
//! use repo_collector::{Collector, Config, SearchQuery};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collector = Collector::new(Config::default()).await?;
//!
//!     let mut events = collector.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let query = SearchQuery::new("trading bot python", 10, None)?;
//!     let report = collector.run(&query, &CancellationToken::new()).await?;
//!     println!("archive: {:?}", report.archive_path);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Zip packaging of the workspace
pub mod archive;
/// End-to-end orchestration
pub mod collector;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Single-repository fetch with timeout and rollback
pub mod fetch;
/// Interactive and static input
pub mod input;
/// Fixed-size fetch worker pool
pub mod pool;
/// Run summary and manifest
pub mod report;
/// Retrieval backends
pub mod retrieval;
/// Forge search client
pub mod search;
/// Core types and events
pub mod types;
/// Workspace directory and slot management
pub mod workspace;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use collector::{Collector, RunReport};
pub use config::{Config, FetchConfig, PoolConfig, SearchConfig, WorkspaceConfig};
pub use error::{Error, FetchError, Result, SearchError};
pub use fetch::FetchTask;
pub use pool::{PoolRun, WorkerPool};
pub use report::{ReportAggregator, RunSummary};
pub use retrieval::{GitCli, Retriever};
pub use search::{SearchClient, SearchResults};
pub use types::{
    Credential, Event, FetchOutcome, FetchStatus, Progress, RepositoryDescriptor, SearchQuery,
    SkipReason,
};
pub use workspace::Workspace;

/// Cancel `token` when the process receives an interrupt
///
/// Spawns a task that waits for a termination signal. Pass the same token to
/// [`Collector::run`] so in-flight clones are killed and rolled back.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let cancel = CancellationToken::new();
///     repo_collector::cancel_on_signal(cancel.clone());
///     cancel.cancelled().await;
/// }
/// ```
pub fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        token.cancel();
    });
}

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Wait for a termination signal (Ctrl+C).
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
