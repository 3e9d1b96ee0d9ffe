//! Session outcomes and summaries

use chrono::{DateTime, Utc};
use osync_core::domain::{Identifier, LibraryMode};
use serde::Serialize;

use crate::pipeline::PipelineReport;
use crate::SyncError;

/// What happened to the library database during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    /// The mode has no database (Stable)
    NotApplicable,
    /// The session ended before the database step
    Pending,
    /// The server had no database to hand out
    NotOnServer,
    /// The local database was replaced, previous copy kept as `.bak`
    Replaced,
}

/// One identifier that was not fetched, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub id: Identifier,
    pub reason: String,
}

/// Summary of a sync session
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: LibraryMode,
    /// Normalized server address, once known
    pub base_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub database: DatabaseStatus,
    /// Entries in the server manifest
    pub remote_count: usize,
    /// Entries in the local manifest before fetching
    pub local_count: usize,
    /// Entries missing locally
    pub to_fetch: usize,
    pub fetched: usize,
    pub bytes: u64,
    /// Entries the server no longer had
    pub skipped: Vec<FetchFailure>,
    pub failures: Vec<FetchFailure>,
    /// Entries never attempted because the session was cancelled
    pub not_started: usize,
    /// Stable installs only pick up new beatmaps after a song list refresh
    pub requires_library_refresh: bool,
}

impl SyncReport {
    pub fn new(mode: LibraryMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            base_url: None,
            started_at,
            duration_ms: 0,
            database: if mode.has_database() {
                DatabaseStatus::Pending
            } else {
                DatabaseStatus::NotApplicable
            },
            remote_count: 0,
            local_count: 0,
            to_fetch: 0,
            fetched: 0,
            bytes: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
            not_started: 0,
            requires_library_refresh: false,
        }
    }

    /// Folds the fetch pipeline's results into the session summary.
    pub fn absorb(&mut self, pipeline: PipelineReport) {
        self.fetched += pipeline.fetched;
        self.bytes += pipeline.bytes;
        self.skipped.extend(pipeline.skipped);
        self.failures.extend(pipeline.failed);
        self.not_started += pipeline.not_started + pipeline.interrupted;
    }

    /// True when nothing was left behind
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.not_started == 0
    }
}

/// How a sync session ended
#[derive(Debug)]
pub enum SyncOutcome {
    /// Every step ran; individual files may still have failed
    Completed(SyncReport),
    /// The user stopped the session
    Cancelled(SyncReport),
    /// A session-level error ended the run
    Failed {
        error: SyncError,
        report: SyncReport,
    },
}

impl SyncOutcome {
    pub fn report(&self) -> &SyncReport {
        match self {
            Self::Completed(report) | Self::Cancelled(report) => report,
            Self::Failed { report, .. } => report,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Short status word used by the CLI
    pub fn status(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Cancelled(_) => "cancelled",
            Self::Failed { .. } => "failed",
        }
    }
}
