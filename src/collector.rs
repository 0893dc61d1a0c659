//! End-to-end run: search, fetch, report, archive
//!
//! [`Collector`] owns the configuration and the retrieval backend and wires
//! the phases together. Consumers observe a run through [`Collector::subscribe`].

use crate::archive;
use crate::config::Config;
use crate::error::{Error, Result, SearchError};
use crate::fetch::FetchTask;
use crate::pool::WorkerPool;
use crate::report::{ReportAggregator, RunSummary};
use crate::retrieval::{GitCli, Retriever};
use crate::search::{SearchClient, SearchResults};
use crate::types::{Event, SearchQuery};
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 1000;

/// What a run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Condition that cut the search short, if any
    pub search_interruption: Option<SearchError>,
    /// Summary of the fetch phase; `None` when the search found nothing
    pub summary: Option<RunSummary>,
    /// Manifest location, if one was written and kept
    pub manifest_path: Option<PathBuf>,
    /// Archive location, if one was created
    pub archive_path: Option<PathBuf>,
    /// Workspace location, if it was kept on disk
    pub workspace_dir: Option<PathBuf>,
    /// Whether the run was interrupted
    pub cancelled: bool,
}

impl RunReport {
    /// Whether the search came back empty
    pub fn nothing_found(&self) -> bool {
        self.summary.is_none() && !self.cancelled
    }
}

/// Search-and-collect pipeline
pub struct Collector {
    config: Arc<Config>,
    retriever: Arc<dyn Retriever>,
    event_tx: broadcast::Sender<Event>,
}

impl Collector {
    /// Create a collector backed by the git executable
    ///
    /// Fails with [`crate::Error::NotSupported`] if git cannot be found or
    /// does not run.
    pub async fn new(config: Config) -> Result<Self> {
        let git = GitCli::from_config(&config.fetch)?;
        let version = git.version().await?;
        info!(binary = %git.binary_path().display(), %version, "using git");
        Self::with_retriever(config, Arc::new(git))
    }

    /// Create a collector with a custom retrieval backend
    pub fn with_retriever(config: Config, retriever: Arc<dyn Retriever>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            retriever,
            event_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline for `query`
    ///
    /// Search failures never fail the run; they shorten the result list. An
    /// empty result list ends the run early with nothing written. When
    /// `cancel` fires, no manifest or archive is produced and the workspace
    /// is removed unless configured to be kept.
    pub async fn run(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let settings = &self.config.workspace;
        tokio::fs::create_dir_all(&settings.output_dir).await?;
        let workspace = Workspace::prepare(&settings.output_dir, &settings.workspace_name).await?;
        info!(
            workspace = %workspace.root().display(),
            retriever = self.retriever.name(),
            "workspace ready"
        );

        let result = self.run_in(&workspace, query, cancel).await;

        let keep = settings.keep_workspace;
        let workspace_dir = workspace.root().to_path_buf();
        if keep {
            info!(path = %workspace_dir.display(), "keeping workspace");
        } else {
            workspace.teardown().await;
        }

        let mut report = result?;
        if keep {
            report.workspace_dir = Some(workspace_dir);
        } else {
            // The manifest lived in the workspace and is gone with it.
            report.manifest_path = None;
        }
        Ok(report)
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let search =
            SearchClient::new(self.config.search.clone())?.with_events(self.event_tx.clone());

        let results: SearchResults = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled during search");
                return Ok(RunReport { cancelled: true, ..Default::default() });
            }
            results = search.search(query) => results,
        };

        let SearchResults {
            repositories,
            interruption,
            ..
        } = results;

        if repositories.is_empty() {
            info!(query = %query.text(), "no repositories found");
            return Ok(RunReport {
                search_interruption: interruption,
                ..Default::default()
            });
        }

        let fetcher = FetchTask::new(
            Arc::clone(&self.retriever),
            self.config.fetch.clone(),
            query.credential().cloned(),
        );
        let pool = WorkerPool::new(fetcher, self.config.pool.workers)
            .with_events(self.event_tx.clone());
        let run = pool.run(&repositories, workspace, cancel).await;

        let mut aggregator = ReportAggregator::new(query.text(), query.count(), repositories);
        for outcome in run.outcomes {
            aggregator.record(outcome);
        }
        let summary = aggregator.finish();

        if run.cancelled {
            warn!(
                succeeded = summary.succeeded,
                "run cancelled, skipping manifest and archive"
            );
            return Ok(RunReport {
                search_interruption: interruption,
                summary: Some(summary),
                cancelled: true,
                ..Default::default()
            });
        }

        let settings = &self.config.workspace;
        let manifest_path = workspace.root().join(&settings.manifest_name);
        summary.write_manifest(&manifest_path)?;
        self.emit(Event::ManifestWritten {
            path: manifest_path.clone(),
        });

        let archive_path = if settings.archive {
            let path = archive::archive_path(
                &settings.output_dir,
                query.text(),
                &summary.timestamp_label(),
            );
            // Walking and deflating the whole workspace is blocking work
            let source = workspace.root().to_path_buf();
            let destination = path.clone();
            spawn_blocking(move || archive::create_archive(&source, &destination))
                .await
                .map_err(|e| {
                    Error::Io(std::io::Error::other(format!(
                        "archive task panicked: {e}"
                    )))
                })??;
            self.emit(Event::ArchiveCreated { path: path.clone() });
            Some(path)
        } else {
            None
        };

        info!(
            requested = summary.requested,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );

        Ok(RunReport {
            search_interruption: interruption,
            summary: Some(summary),
            manifest_path: Some(manifest_path),
            archive_path,
            workspace_dir: None,
            cancelled: false,
        })
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
