//! Sync client
//!
//! A [`SyncClient`] pulls a remote library into a local one:
//!
//! 1. Normalize the endpoint and make sure the local root exists
//! 2. `GET /ping` and refuse to continue on a mode mismatch
//! 3. Lazer only: replace `client.realm` (see [`crate::database`])
//! 4. `GET /manifest`, scan the local library, diff
//! 5. Fetch the missing entries through a [`FetchPipeline`]
//!
//! Every step is narrated to a [`ProgressSink`] and every path out of a
//! session ends with one final line: `Done`, `Stopped by user` or
//! `Error: ...`.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use osync_core::{
    config::ClientConfig,
    domain::{AddressScheme, Identifier, LibraryMode, Manifest},
    ports::ProgressSink,
};
use reqwest::{Client, StatusCode};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    database,
    download::{self, DownloadError},
    endpoint::normalize_endpoint,
    pipeline::{FetchOutcome, FetchPipeline},
    report::{DatabaseStatus, SyncOutcome, SyncReport},
    SyncError,
};

/// User agent sent with every request
const USER_AGENT: &str = concat!("osync/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SyncRequest
// ============================================================================

/// What to sync and where to put it
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Server address as typed by the user
    pub endpoint: String,
    /// Local library root
    pub root: PathBuf,
    /// Mode of the local library
    pub mode: LibraryMode,
}

impl SyncRequest {
    pub fn new(endpoint: impl Into<String>, root: impl Into<PathBuf>, mode: LibraryMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            root: root.into(),
            mode,
        }
    }
}

// ============================================================================
// Narration
// ============================================================================

/// Forwards progress lines to the caller's sink and mirrors them to tracing.
struct Narrator<'a> {
    sink: &'a dyn ProgressSink,
}

impl ProgressSink for Narrator<'_> {
    fn log(&self, message: &str) {
        info!(target: "osync::progress", "{message}");
        self.sink.log(message);
    }
}

/// Races `fut` against cancellation.
async fn or_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, SyncError>>,
) -> Result<T, SyncError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = fut => result,
    }
}

// ============================================================================
// SyncClient
// ============================================================================

/// Pull-side sync engine
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: Client,
    config: ClientConfig,
}

impl SyncClient {
    /// Builds a client with a connection pool sized for `config.concurrency`.
    ///
    /// Only connection establishment is time-limited; large transfers may
    /// take as long as they need.
    pub fn new(config: ClientConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host.max(config.concurrency))
            .build()
            .map_err(SyncError::HttpClient)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs a session in the background.
    pub fn spawn(&self, request: SyncRequest, sink: Arc<dyn ProgressSink>) -> SyncHandle {
        let cancel = CancellationToken::new();
        let client = self.clone();
        let token = cancel.clone();
        let mode = request.mode;
        let task_sink = Arc::clone(&sink);
        let task =
            tokio::spawn(async move { client.sync(&request, task_sink.as_ref(), &token).await });

        SyncHandle {
            cancel,
            task,
            mode,
            sink,
        }
    }

    /// Runs a session to completion on the current task.
    ///
    /// Never returns an `Err`; all failures are folded into the outcome
    /// after being narrated to `sink`.
    #[instrument(skip_all, fields(session = %Uuid::new_v4(), endpoint = %request.endpoint, mode = %request.mode))]
    pub async fn sync(
        &self,
        request: &SyncRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> SyncOutcome {
        let narrator = Narrator { sink };
        let clock = Instant::now();
        let mut report = SyncReport::new(request.mode, Utc::now());

        narrator.log("=== Starting sync ===");
        let result = self.run(request, &narrator, cancel, &mut report).await;
        report.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) if !cancel.is_cancelled() => {
                if report.requires_library_refresh {
                    narrator.log("Refresh the song list in the game to see new beatmaps");
                }
                narrator.log("Done");
                SyncOutcome::Completed(report)
            }
            Ok(()) | Err(SyncError::Cancelled) => {
                narrator.log("Stopped by user");
                SyncOutcome::Cancelled(report)
            }
            Err(error) => {
                warn!(error = %error, "Sync failed");
                narrator.log(&format!("Error: {error}"));
                SyncOutcome::Failed { error, report }
            }
        }
    }

    async fn run(
        &self,
        request: &SyncRequest,
        narrator: &Narrator<'_>,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let base = normalize_endpoint(&request.endpoint, self.config.default_port)?;
        report.base_url = Some(base.clone());
        narrator.log(&format!("Server: {base}"));

        ensure_root(&request.root, narrator).await?;

        narrator.log("Checking server...");
        or_cancel(cancel, self.check_compat(&base, request.mode)).await?;

        if request.mode.has_database() {
            narrator.log("Downloading client.realm...");
            report.database =
                database::replace_database(&self.http, &base, &request.root, cancel).await?;
            match report.database {
                DatabaseStatus::Replaced => narrator.log("Database updated"),
                _ => narrator.log("Server has no client.realm, keeping the local one"),
            }
        }

        narrator.log("Fetching file list...");
        let remote = or_cancel(cancel, self.fetch_manifest(&base, request.mode)).await?;
        report.remote_count = remote.len();
        narrator.log(&format!("Files on server: {}", remote.len()));

        let local = scan_local(&request.root, request.mode).await?;
        report.local_count = local.len();

        let missing = remote.missing_from(&local);
        report.to_fetch = missing.len();
        if missing.is_empty() {
            narrator.log("All files already in place");
        } else {
            narrator.log(&format!("Files to download: {}", missing.len()));

            let pipeline = FetchPipeline::new(self.config.concurrency, self.config.progress_stride);
            let fetcher = ItemFetcher {
                http: self.http.clone(),
                base: Arc::from(base.as_str()),
                root: Arc::from(request.root.as_path()),
                scheme: request.mode.scheme(),
                cancel: cancel.clone(),
            };
            let outcome = pipeline
                .run(missing, |id| fetcher.clone().fetch(id), cancel, narrator)
                .await;

            let cancelled = outcome.cancelled;
            report.absorb(outcome);
            if cancelled {
                return Err(SyncError::Cancelled);
            }
        }

        report.requires_library_refresh = request.mode == LibraryMode::Stable;
        Ok(())
    }

    /// `GET /ping` and compare the announced mode with ours.
    async fn check_compat(&self, base: &str, mode: LibraryMode) -> Result<(), SyncError> {
        let response = self
            .http
            .get(format!("{base}/ping"))
            .send()
            .await
            .map_err(|source| SyncError::Connectivity {
                addr: base.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::UnexpectedStatus {
                what: "/ping",
                status,
            });
        }

        let body = response.text().await.map_err(|source| SyncError::Connectivity {
            addr: base.to_string(),
            source,
        })?;
        let remote: LibraryMode = body
            .parse()
            .map_err(|_| SyncError::Protocol(body.trim().to_string()))?;

        if remote != mode {
            return Err(SyncError::ModeMismatch {
                remote,
                local: mode,
            });
        }
        debug!(%remote, "Server mode matches");
        Ok(())
    }

    async fn fetch_manifest(&self, base: &str, mode: LibraryMode) -> Result<Manifest, SyncError> {
        let connectivity = |source| SyncError::Connectivity {
            addr: base.to_string(),
            source,
        };

        let response = self
            .http
            .get(format!("{base}/manifest"))
            .send()
            .await
            .map_err(connectivity)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SyncError::ManifestUnavailable(status));
        }

        let text = response.text().await.map_err(connectivity)?;
        Ok(Manifest::parse(mode, &text))
    }
}

async fn ensure_root(root: &Path, narrator: &Narrator<'_>) -> Result<(), SyncError> {
    if tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
        return Ok(());
    }
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|source| SyncError::LibraryRoot {
            path: root.to_path_buf(),
            source,
        })?;
    narrator.log(&format!("Created library folder {}", root.display()));
    Ok(())
}

async fn scan_local(root: &Path, mode: LibraryMode) -> Result<Manifest, SyncError> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || Manifest::scan(&root, mode))
        .await
        .map_err(|e| SyncError::TaskFailed(e.to_string()))
}

// ============================================================================
// ItemFetcher
// ============================================================================

/// Everything one fetch task needs, shared cheaply between tasks
#[derive(Clone)]
struct ItemFetcher {
    http: Client,
    base: Arc<str>,
    root: Arc<Path>,
    scheme: &'static dyn AddressScheme,
    cancel: CancellationToken,
}

impl ItemFetcher {
    async fn fetch(self, id: Identifier) -> FetchOutcome {
        if self.cancel.is_cancelled() {
            return FetchOutcome::Cancelled { id };
        }

        let dest = match self.scheme.locate(&self.root, &id) {
            Ok(dest) => dest,
            Err(e) => {
                return FetchOutcome::Failed {
                    id,
                    reason: e.to_string(),
                }
            }
        };
        if let Some(parent) = dest.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return FetchOutcome::Failed {
                    id,
                    reason: format!("cannot create {}: {e}", parent.display()),
                };
            }
        }

        let url = format!("{}{}", self.base, self.scheme.request_path(&id));
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return FetchOutcome::Cancelled { id },
            sent = self.http.get(&url).send() => sent,
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                return FetchOutcome::Failed {
                    id,
                    reason: format!("request failed: {e}"),
                }
            }
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return FetchOutcome::Skipped {
                    id,
                    reason: "not on server".to_string(),
                }
            }
            status => {
                return FetchOutcome::Failed {
                    id,
                    reason: format!("HTTP {status}"),
                }
            }
        }

        match download::download_file(response, &dest, &self.cancel).await {
            Ok(bytes) => FetchOutcome::Fetched { id, bytes },
            Err(DownloadError::Cancelled) => FetchOutcome::Cancelled { id },
            Err(e) => FetchOutcome::Failed {
                id,
                reason: e.to_string(),
            },
        }
    }
}

// ============================================================================
// SyncHandle
// ============================================================================

/// Handle to a session started with [`SyncClient::spawn`]
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<SyncOutcome>,
    mode: LibraryMode,
    sink: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("mode", &self.mode)
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl SyncHandle {
    /// Asks the session to stop. Running transfers are aborted and no new
    /// ones start.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drops the session task without letting it narrate its own ending.
    /// [`SyncHandle::join`] still reports the session as failed.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Waits for the session to end.
    ///
    /// A session task that panicked or was aborted still ends with an
    /// `Error: ...` line on the sink.
    pub async fn join(self) -> SyncOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = SyncError::TaskFailed(e.to_string());
                warn!(error = %error, "Sync task ended abnormally");
                self.sink.log(&format!("Error: {error}"));
                SyncOutcome::Failed {
                    error,
                    report: SyncReport::new(self.mode, Utc::now()),
                }
            }
        }
    }
}
