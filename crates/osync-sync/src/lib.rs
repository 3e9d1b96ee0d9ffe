//! Osync Sync - Pull a remote library into a local one
//!
//! Provides:
//! - Endpoint normalization and the `/ping` compatibility check
//! - Crash-safe replacement of the `client.realm` database
//! - Manifest diff (`remote - local`)
//! - A bounded, cancellable fetch pipeline with per-item outcomes
//!
//! ## Modules
//!
//! - [`client`] - [`SyncClient`] and the [`SyncHandle`] session handle
//! - [`pipeline`] - [`FetchPipeline`], the bounded concurrent fetcher
//! - [`database`] - Temp-then-rename replacement of the database file
//! - [`download`] - Streaming a response body to disk through a temp file
//! - [`endpoint`] - Turning user input into a base URL
//! - [`report`] - Session outcomes and summaries

pub mod client;
pub mod database;
pub mod download;
pub mod endpoint;
pub mod pipeline;
pub mod report;

use std::path::PathBuf;

use osync_core::domain::LibraryMode;
use reqwest::StatusCode;
use thiserror::Error;

pub use client::{SyncClient, SyncHandle, SyncRequest};
pub use pipeline::{FetchOutcome, FetchPipeline, PipelineReport};
pub use report::{DatabaseStatus, FetchFailure, SyncOutcome, SyncReport};

/// Errors that end a sync session
///
/// Per-file problems never appear here; they are recorded as
/// [`FetchOutcome`]s and the session carries on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The endpoint could not be turned into a URL
    #[error("Invalid server address '{0}'")]
    InvalidEndpoint(String),

    /// The local library root does not exist and could not be created
    #[error("Cannot create library folder {path}: {source}")]
    LibraryRoot {
        /// Root that was requested
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The server could not be reached
    #[error("Cannot connect to {addr}: {source}")]
    Connectivity {
        /// Base URL of the server
        addr: String,
        /// Transport error
        #[source]
        source: reqwest::Error,
    },

    /// Client and server run different library modes
    #[error("Mode mismatch: server is {remote}, this library is {local}")]
    ModeMismatch {
        /// Mode announced by the server
        remote: LibraryMode,
        /// Mode of the local library
        local: LibraryMode,
    },

    /// The server answered `/ping` with something that is not a mode tag
    #[error("Unexpected answer from server: {0:?}")]
    Protocol(String),

    /// The server has no manifest to diff against
    #[error("Server file list unavailable (HTTP {0})")]
    ManifestUnavailable(StatusCode),

    /// The server answered a session-level request with an unexpected status
    #[error("{what} returned HTTP {status}")]
    UnexpectedStatus {
        /// Route that was requested
        what: &'static str,
        /// Status received
        status: StatusCode,
    },

    /// A local filesystem operation of the session itself failed
    #[error("Local I/O error on {path}: {source}")]
    LocalIo {
        /// Path being written
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// A background task of the session panicked or was aborted
    #[error("Sync task failed: {0}")]
    TaskFailed(String),

    /// The user asked the session to stop
    #[error("Stopped by user")]
    Cancelled,
}
