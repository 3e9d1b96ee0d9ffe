//! Replacing the library database
//!
//! The server's `client.realm` is downloaded to `client.realm.tmp`. Only
//! when the download is complete is the current database moved aside:
//! the previous `.bak` is dropped, the current file is hard-linked (or
//! copied, where links are unsupported) to `.bak`, and the temp file is
//! renamed over `client.realm`. A session that dies at any point leaves
//! either the old database or the new one in place, never a torn file.

use std::{
    io,
    path::{Path, PathBuf},
};

use osync_core::domain::{BACKUP_SUFFIX, DATABASE_FILE, DATABASE_TEMP_SUFFIX};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    download::{self, DownloadError},
    report::DatabaseStatus,
    SyncError,
};

/// Paths involved in replacing the database under one library root
#[derive(Debug, Clone)]
pub struct DatabasePaths {
    pub current: PathBuf,
    pub temp: PathBuf,
    pub backup: PathBuf,
}

impl DatabasePaths {
    pub fn new(root: &Path) -> Self {
        let current = root.join(DATABASE_FILE);
        Self {
            temp: root.join(format!("{DATABASE_FILE}{DATABASE_TEMP_SUFFIX}")),
            backup: root.join(format!("{DATABASE_FILE}{BACKUP_SUFFIX}")),
            current,
        }
    }
}

/// Downloads `/realm` from `base_url` and installs it under `root`.
#[instrument(skip_all, fields(base_url = %base_url, root = %root.display()))]
pub async fn replace_database(
    http: &reqwest::Client,
    base_url: &str,
    root: &Path,
    cancel: &CancellationToken,
) -> Result<DatabaseStatus, SyncError> {
    let send = http.get(format!("{base_url}/realm")).send();
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
        response = send => response.map_err(|source| SyncError::Connectivity {
            addr: base_url.to_string(),
            source,
        })?,
    };

    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => {
            info!("Server has no database");
            return Ok(DatabaseStatus::NotOnServer);
        }
        status => {
            return Err(SyncError::UnexpectedStatus {
                what: "/realm",
                status,
            })
        }
    }

    let paths = DatabasePaths::new(root);
    match download::stream_to_path(response, &paths.temp, cancel).await {
        Ok(bytes) => debug!(bytes, "Database downloaded"),
        Err(e) => {
            let _ = tokio::fs::remove_file(&paths.temp).await;
            return Err(match e {
                DownloadError::Cancelled => SyncError::Cancelled,
                DownloadError::Transport(source) => SyncError::Connectivity {
                    addr: base_url.to_string(),
                    source,
                },
                DownloadError::Io(source) => SyncError::LocalIo {
                    path: paths.temp.clone(),
                    source,
                },
            });
        }
    }

    let current = paths.current.clone();
    tokio::task::spawn_blocking(move || promote(&paths))
        .await
        .map_err(|e| SyncError::TaskFailed(e.to_string()))?
        .map_err(|source| SyncError::LocalIo {
            path: current,
            source,
        })?;

    info!("Database replaced");
    Ok(DatabaseStatus::Replaced)
}

/// Moves a fully downloaded temp database into place, keeping the current
/// one as the backup.
pub fn promote(paths: &DatabasePaths) -> io::Result<()> {
    if paths.current.exists() {
        match std::fs::remove_file(&paths.backup) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Err(e) = std::fs::hard_link(&paths.current, &paths.backup) {
            debug!(error = %e, "Hard link failed, copying database backup");
            std::fs::copy(&paths.current, &paths.backup)?;
        }
    }
    std::fs::rename(&paths.temp, &paths.current)
}
