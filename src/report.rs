//! Run summary and manifest
//!
//! Outcomes arrive in completion order. The aggregator re-keys them to the
//! descriptors by full name, so the manifest always follows search order
//! (most-starred first) no matter how the workers finished.

use crate::error::Result;
use crate::types::{FetchOutcome, FetchStatus, RepositoryDescriptor};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};

/// Timestamp format used in the manifest and archive names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%Hh%Mm";

/// Width of the separator line under the manifest header
const SEPARATOR_WIDTH: usize = 30;

/// One manifest line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// The discovered repository
    pub descriptor: RepositoryDescriptor,
    /// Outcome of its fetch, `None` if the run stopped before it ran
    pub status: Option<FetchStatus>,
}

/// Final description of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// When the summary was produced
    pub generated_at: DateTime<Local>,
    /// Search text
    pub query: String,
    /// Requested repository count
    pub requested: usize,
    /// Fetches that succeeded
    pub succeeded: usize,
    /// Fetches skipped because the slot existed
    pub skipped: usize,
    /// Fetches that failed
    pub failed: usize,
    /// Every discovered repository, in search order
    pub entries: Vec<ManifestEntry>,
}

impl RunSummary {
    /// `generated_at` formatted for file names and the manifest header
    pub fn timestamp_label(&self) -> String {
        self.generated_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Render the plain-text manifest
    pub fn render_manifest(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "Report generated on {}", self.timestamp_label());
        let _ = writeln!(out, "Query: {}", self.query);
        let _ = writeln!(out, "Requested: {}", self.requested);
        let _ = writeln!(out, "Downloaded: {}", self.succeeded);
        let _ = writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH));
        for entry in &self.entries {
            let d = &entry.descriptor;
            let _ = writeln!(out, "[{}★] {} -> {}", d.stars, d.full_name, d.clone_url);
        }
        out
    }

    /// Write the manifest to `path`
    pub fn write_manifest(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render_manifest())?;
        debug!(path = %path.display(), entries = self.entries.len(), "manifest written");
        Ok(())
    }

    /// Serialize the summary as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collects outcomes as they arrive and produces a [`RunSummary`]
#[derive(Debug)]
pub struct ReportAggregator {
    query: String,
    requested: usize,
    descriptors: Vec<RepositoryDescriptor>,
    outcomes: HashMap<String, FetchStatus>,
}

impl ReportAggregator {
    /// Start aggregating for the descriptors returned by the search
    pub fn new(
        query: impl Into<String>,
        requested: usize,
        descriptors: Vec<RepositoryDescriptor>,
    ) -> Self {
        Self {
            query: query.into(),
            requested,
            outcomes: HashMap::with_capacity(descriptors.len()),
            descriptors,
        }
    }

    /// Record one outcome; the first outcome per full name wins
    pub fn record(&mut self, outcome: FetchOutcome) {
        let key = outcome.descriptor.full_name;
        if self.outcomes.contains_key(&key) {
            warn!(repo = %key, "second outcome for the same repository ignored");
            return;
        }
        self.outcomes.insert(key, outcome.status);
    }

    /// Finalize the summary
    pub fn finish(mut self) -> RunSummary {
        let entries: Vec<ManifestEntry> = self
            .descriptors
            .into_iter()
            .map(|descriptor| {
                let status = self.outcomes.remove(&descriptor.full_name);
                ManifestEntry { descriptor, status }
            })
            .collect();

        if !self.outcomes.is_empty() {
            warn!(
                count = self.outcomes.len(),
                "outcomes without a matching descriptor ignored"
            );
        }

        let count = |pred: fn(&FetchStatus) -> bool| {
            entries
                .iter()
                .filter(|e| e.status.as_ref().is_some_and(pred))
                .count()
        };
        let succeeded = count(|s| matches!(s, FetchStatus::Success));
        let skipped = count(|s| matches!(s, FetchStatus::Skipped(_)));
        let failed = count(|s| matches!(s, FetchStatus::Failed(_)));

        RunSummary {
            generated_at: Local::now(),
            query: self.query,
            requested: self.requested,
            succeeded,
            skipped,
            failed,
            entries,
        }
    }
}

/// Build a summary in one call
pub fn summarize(
    query: &str,
    requested: usize,
    descriptors: &[RepositoryDescriptor],
    outcomes: impl IntoIterator<Item = FetchOutcome>,
) -> RunSummary {
    let mut aggregator = ReportAggregator::new(query, requested, descriptors.to_vec());
    for outcome in outcomes {
        aggregator.record(outcome);
    }
    aggregator.finish()
}
