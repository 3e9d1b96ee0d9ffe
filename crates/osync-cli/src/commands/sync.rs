//! Sync command - Pull a library from another machine
//!
//! Provides the `osync sync <endpoint>` CLI command which:
//! 1. Resolves the local library folder and mode
//! 2. Runs one sync session, printing progress as it goes
//! 3. Cancels the session on Ctrl+C
//! 4. Prints a summary and exits non-zero unless the session completed

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use osync_core::domain::LibraryMode;
use osync_sync::{DatabaseStatus, SyncClient, SyncOutcome, SyncReport, SyncRequest};
use tracing::info;

use super::{resolve_root_for_system, Context};
use crate::{
    output::{OutputFormat, OutputFormatter},
    shutdown,
};

/// Exit code used when the user stops a session
const EXIT_CANCELLED: u8 = 130;

/// Failures listed individually before the rest are summarized
const MAX_LISTED_FAILURES: usize = 10;

/// Arguments for the sync subcommand
#[derive(Debug, clap::Args)]
pub struct SyncCommand {
    /// Server address: host, host:port, or a full http:// URL
    pub endpoint: String,

    /// Local library folder (defaults to the configured or detected one)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Library mode: lazer or stable
    #[arg(long)]
    pub mode: Option<LibraryMode>,

    /// Maximum simultaneous downloads
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<ExitCode> {
        let formatter: Arc<dyn OutputFormatter + Send + Sync> = Arc::from(ctx.formatter());
        let mode = self.mode.unwrap_or(ctx.config.library.mode);
        let root = resolve_root_for_system(self.root.clone(), &ctx.config, mode)?;

        let mut client_config = ctx.config.client.clone();
        if let Some(n) = self.concurrency {
            client_config.concurrency = n.max(1);
            client_config.pool_max_idle_per_host = client_config.pool_max_idle_per_host.max(n);
        }
        let client = SyncClient::new(client_config)?;

        info!(endpoint = %self.endpoint, root = %root.display(), %mode, "Starting sync");

        let sink = {
            let formatter = Arc::clone(&formatter);
            move |line: &str| formatter.progress(line)
        };
        let handle = client.spawn(
            SyncRequest::new(self.endpoint.clone(), root, mode),
            Arc::new(sink),
        );

        let token = handle.cancellation_token();
        let watcher = tokio::spawn(async move {
            shutdown::wait_for_signal().await;
            token.cancel();
        });
        let outcome = handle.join().await;
        watcher.abort();

        print_summary(&outcome, formatter.as_ref(), ctx.format);

        Ok(match outcome {
            SyncOutcome::Completed(_) => ExitCode::SUCCESS,
            SyncOutcome::Cancelled(_) => ExitCode::from(EXIT_CANCELLED),
            SyncOutcome::Failed { .. } => ExitCode::FAILURE,
        })
    }
}

fn database_line(status: DatabaseStatus) -> Option<&'static str> {
    match status {
        DatabaseStatus::Replaced => Some("Database: replaced (previous copy kept as client.realm.bak)"),
        DatabaseStatus::NotOnServer => Some("Database: not on server, local copy kept"),
        DatabaseStatus::Pending => Some("Database: not updated"),
        DatabaseStatus::NotApplicable => None,
    }
}

fn print_report(report: &SyncReport, formatter: &dyn OutputFormatter) {
    if let Some(base) = &report.base_url {
        formatter.info(&format!("Server: {base}"));
    }
    if let Some(line) = database_line(report.database) {
        formatter.info(line);
    }
    formatter.info(&format!(
        "Files: {} on server, {} local, {} missing",
        report.remote_count, report.local_count, report.to_fetch
    ));
    formatter.info(&format!(
        "Downloaded: {} ({} bytes) in {} ms",
        report.fetched, report.bytes, report.duration_ms
    ));
    if !report.skipped.is_empty() {
        formatter.info(&format!("Skipped (gone from server): {}", report.skipped.len()));
    }
    if report.not_started > 0 {
        formatter.info(&format!("Not downloaded: {}", report.not_started));
    }
    for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
        formatter.warn(&format!("{}: {}", failure.id, failure.reason));
    }
    if report.failures.len() > MAX_LISTED_FAILURES {
        formatter.warn(&format!(
            "... and {} more failures",
            report.failures.len() - MAX_LISTED_FAILURES
        ));
    }
}

fn print_summary(outcome: &SyncOutcome, formatter: &dyn OutputFormatter, format: OutputFormat) {
    let report = outcome.report();

    if format.is_json() {
        let error = match outcome {
            SyncOutcome::Failed { error, .. } => Some(error.to_string()),
            _ => None,
        };
        formatter.print_json(&serde_json::json!({
            "status": outcome.status(),
            "error": error,
            "report": report,
        }));
        return;
    }

    match outcome {
        SyncOutcome::Completed(report) if report.is_complete() => {
            formatter.success("Sync complete");
        }
        SyncOutcome::Completed(report) => {
            formatter.warn(&format!(
                "Sync finished with {} failed file{}",
                report.failures.len(),
                if report.failures.len() == 1 { "" } else { "s" }
            ));
        }
        SyncOutcome::Cancelled(_) => formatter.warn("Sync stopped by user"),
        SyncOutcome::Failed { error, .. } => formatter.error(&error.to_string()),
    }
    print_report(report, formatter);
}
