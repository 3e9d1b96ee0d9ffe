//! Bounded concurrent fetching
//!
//! [`FetchPipeline`] runs a caller-supplied fetch future for every missing
//! identifier with at most `concurrency` of them in flight. Outcomes are
//! collected in one place, which also emits progress lines and per-item
//! failures to the [`ProgressSink`].
//!
//! ```text
//!  items ──► acquire permit ──► spawn fetch(id) ──► JoinSet ──► collector
//!              (or cancel)         holds permit                 ├─ counters
//!                                                                └─ sink
//! ```
//!
//! One item's failure never affects the others. Cancellation stops new
//! items from starting; items already running finish or abort on their own.

use std::{collections::HashMap, future::Future, sync::Arc};

use osync_core::domain::Identifier;
use osync_core::ports::ProgressSink;
use tokio::{
    sync::Semaphore,
    task::{self, JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::report::FetchFailure;

// ============================================================================
// FetchOutcome
// ============================================================================

/// Result of fetching a single identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Content is on disk at its final path
    Fetched { id: Identifier, bytes: u64 },
    /// The server no longer has it
    Skipped { id: Identifier, reason: String },
    /// Transport, status or local I/O error
    Failed { id: Identifier, reason: String },
    /// Cancelled before or during the transfer
    Cancelled { id: Identifier },
}

impl FetchOutcome {
    pub fn id(&self) -> &Identifier {
        match self {
            Self::Fetched { id, .. }
            | Self::Skipped { id, .. }
            | Self::Failed { id, .. }
            | Self::Cancelled { id } => id,
        }
    }
}

// ============================================================================
// PipelineReport
// ============================================================================

/// Tally of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub total: usize,
    pub fetched: usize,
    pub bytes: u64,
    pub skipped: Vec<FetchFailure>,
    pub failed: Vec<FetchFailure>,
    /// Started but stopped by cancellation
    pub interrupted: usize,
    /// Never started because of cancellation
    pub not_started: usize,
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Items that reached a final outcome
    pub fn completed(&self) -> usize {
        self.fetched + self.skipped.len() + self.failed.len()
    }
}

// ============================================================================
// FetchPipeline
// ============================================================================

/// Runs fetches with bounded concurrency
#[derive(Debug, Clone)]
pub struct FetchPipeline {
    concurrency: usize,
    progress_stride: usize,
}

impl FetchPipeline {
    /// Both limits are clamped to at least 1.
    pub fn new(concurrency: usize, progress_stride: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            progress_stride: progress_stride.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every item in `items` and returns the tally.
    ///
    /// `fetch` builds the future for one identifier; it runs on its own task
    /// while holding one of the pipeline's permits.
    pub async fn run<F, Fut>(
        &self,
        items: Vec<Identifier>,
        fetch: F,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> PipelineReport
    where
        F: Fn(Identifier) -> Fut,
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let total = items.len();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
        let mut running: HashMap<task::Id, Identifier> = HashMap::new();
        let mut report = PipelineReport::new(total);

        for (index, id) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.not_started = total - index;
                break;
            };

            while let Some(joined) = tasks.try_join_next_with_id() {
                self.record(joined, &mut running, &mut report, sink);
            }

            let work = fetch(id.clone());
            let abort = tasks.spawn(async move {
                let _permit = permit;
                work.await
            });
            running.insert(abort.id(), id);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            self.record(joined, &mut running, &mut report, sink);
        }

        report.cancelled = cancel.is_cancelled();
        debug!(
            total,
            fetched = report.fetched,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            not_started = report.not_started,
            "Fetch pipeline finished"
        );
        report
    }

    fn record(
        &self,
        joined: Result<(task::Id, FetchOutcome), JoinError>,
        running: &mut HashMap<task::Id, Identifier>,
        report: &mut PipelineReport,
        sink: &dyn ProgressSink,
    ) {
        let outcome = match joined {
            Ok((task_id, outcome)) => {
                running.remove(&task_id);
                outcome
            }
            Err(e) => {
                let Some(id) = running.remove(&e.id()) else {
                    warn!(error = %e, "Fetch task ended without an identifier");
                    return;
                };
                FetchOutcome::Failed {
                    id,
                    reason: format!("task failed: {e}"),
                }
            }
        };

        match outcome {
            FetchOutcome::Fetched { bytes, .. } => {
                report.fetched += 1;
                report.bytes += bytes;
            }
            FetchOutcome::Skipped { id, reason } => {
                sink.log(&format!("Skipped {id}: {reason}"));
                report.skipped.push(FetchFailure { id, reason });
            }
            FetchOutcome::Failed { id, reason } => {
                warn!(%id, %reason, "Fetch failed");
                sink.log(&format!("Failed {id}: {reason}"));
                report.failed.push(FetchFailure { id, reason });
            }
            FetchOutcome::Cancelled { .. } => {
                report.interrupted += 1;
                return;
            }
        }

        let done = report.completed();
        if done % self.progress_stride == 0 || done == report.total {
            sink.log(&format!("Downloaded: {done} / {}", report.total));
        }
    }
}
