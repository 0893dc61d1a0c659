//! Worker pool running fetch tasks with a fixed concurrency limit
//!
//! The pool pushes every job into a shared queue up front and starts a fixed
//! number of workers that pop from it until it is empty. Outcomes flow back
//! over a channel to a single collector, which is the only place shared state
//! is updated. A slow task only occupies its own worker.
//!
//! # Cancellation
//!
//! When the run's [`CancellationToken`] fires, workers stop taking jobs and
//! in-flight fetches abort their retrieval (killing the child process and
//! rolling back the slot). The pool then returns whatever outcomes arrived.

use crate::error::FetchError;
use crate::fetch::FetchTask;
use crate::types::{Event, FetchOutcome, FetchStatus, Progress, RepositoryDescriptor};
use crate::workspace::{Slot, Workspace};
use futures::FutureExt;
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// A descriptor paired with the slot it will be cloned into
type Job = (RepositoryDescriptor, PathBuf);

/// Lock-free progress counters updated by the collector
#[derive(Debug, Default)]
struct Counters {
    total: AtomicUsize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.succeeded.store(0, Ordering::SeqCst);
        self.skipped.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }

    fn record(&self, status: &FetchStatus) {
        match status {
            FetchStatus::Success => self.succeeded.fetch_add(1, Ordering::SeqCst),
            FetchStatus::Skipped(_) => self.skipped.fetch_add(1, Ordering::SeqCst),
            FetchStatus::Failed(_) => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Progress {
        Progress {
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Result of a pool run
#[derive(Debug, Clone, Default)]
pub struct PoolRun {
    /// Outcomes in completion order
    pub outcomes: Vec<FetchOutcome>,
    /// Whether the run was interrupted before every job finished
    pub cancelled: bool,
}

/// Fixed-size pool of fetch workers
#[derive(Clone)]
pub struct WorkerPool {
    fetcher: FetchTask,
    workers: usize,
    counters: Arc<Counters>,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl WorkerPool {
    /// Create a pool running at most `workers` fetches at once
    pub fn new(fetcher: FetchTask, workers: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            counters: Arc::new(Counters::default()),
            event_tx: None,
        }
    }

    /// Publish task events on `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Current progress of the active (or last) run
    pub fn progress(&self) -> Progress {
        self.counters.snapshot()
    }

    /// Fetch every descriptor into `workspace`
    ///
    /// Duplicate full names are dropped before scheduling. Descriptors whose
    /// sanitized slot is already claimed by an earlier descriptor are
    /// reported as failed without running. Every other descriptor yields
    /// exactly one outcome unless the run is cancelled first.
    pub async fn run(
        &self,
        descriptors: &[RepositoryDescriptor],
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> PoolRun {
        let unique = dedupe(descriptors);
        let slots = workspace.assign_slots(&unique);
        self.counters.reset(unique.len());

        let mut outcomes = Vec::with_capacity(unique.len());
        let mut queue = VecDeque::with_capacity(unique.len());

        for (descriptor, slot) in unique.into_iter().zip(slots) {
            match slot {
                Slot::Owned(path) => queue.push_back((descriptor, path)),
                Slot::Collision {
                    path,
                    slot,
                    claimed_by,
                } => {
                    let error = FetchError::SlotCollision { slot, claimed_by };
                    let outcome = FetchOutcome {
                        descriptor,
                        status: FetchStatus::Failed(error.to_string()),
                        target: path,
                    };
                    self.record(&outcome);
                    outcomes.push(outcome);
                }
            }
        }

        let jobs = queue.len();
        let workers = self.workers.min(jobs);
        info!(jobs, workers, "starting fetch workers");

        let queue = Arc::new(Mutex::new(queue));
        let (result_tx, mut result_rx) = mpsc::channel::<FetchOutcome>(self.workers * 2);
        let mut handles = JoinSet::new();

        for worker_id in 0..workers {
            handles.spawn(worker_loop(
                worker_id,
                Arc::clone(&queue),
                self.fetcher.clone(),
                result_tx.clone(),
                cancel.clone(),
                self.event_tx.clone(),
            ));
        }
        // Workers hold the remaining senders; the channel closes when they exit.
        drop(result_tx);

        while let Some(outcome) = result_rx.recv().await {
            self.record(&outcome);
            outcomes.push(outcome);
        }

        while let Some(joined) = handles.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "fetch worker terminated abnormally");
            }
        }

        let progress = self.progress();
        let cancelled = cancel.is_cancelled();
        if cancelled {
            info!(
                completed = progress.completed,
                total = progress.total,
                "fetch run cancelled"
            );
            self.emit(Event::Cancelled { progress });
        } else {
            info!(
                succeeded = progress.succeeded,
                skipped = progress.skipped,
                failed = progress.failed,
                "fetch run complete"
            );
        }

        PoolRun {
            outcomes,
            cancelled,
        }
    }

    fn record(&self, outcome: &FetchOutcome) {
        self.counters.record(&outcome.status);
        self.emit(Event::FetchFinished {
            full_name: outcome.descriptor.full_name.clone(),
            status: outcome.status.clone(),
            progress: self.counters.snapshot(),
        });
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }
}

/// Keep the first occurrence of every full name
fn dedupe(descriptors: &[RepositoryDescriptor]) -> Vec<RepositoryDescriptor> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    let mut unique = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if seen.insert(descriptor.full_name.as_str()) {
            unique.push(descriptor.clone());
        } else {
            debug!(repo = %descriptor.full_name, "duplicate descriptor dropped before scheduling");
        }
    }
    unique
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<Job>>>,
    fetcher: FetchTask,
    result_tx: mpsc::Sender<FetchOutcome>,
    cancel: CancellationToken,
    event_tx: Option<broadcast::Sender<Event>>,
) {
    loop {
        if cancel.is_cancelled() {
            debug!(worker_id, "cancelled, not taking new jobs");
            break;
        }

        let job = queue.lock().await.pop_front();
        let Some((descriptor, target)) = job else {
            break;
        };

        if let Some(tx) = &event_tx {
            tx.send(Event::FetchStarted {
                full_name: descriptor.full_name.clone(),
            })
            .ok();
        }

        let fetch = fetcher.fetch_into(&descriptor, target.clone(), &cancel);
        let outcome = match AssertUnwindSafe(fetch).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(worker_id, repo = %descriptor.full_name, "fetch task panicked");
                crate::workspace::remove_dir_best_effort(&target).await;
                FetchOutcome {
                    descriptor,
                    status: FetchStatus::Failed("fetch task panicked".into()),
                    target,
                }
            }
        };

        if result_tx.send(outcome).await.is_err() {
            break;
        }
    }
}
