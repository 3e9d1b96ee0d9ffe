//! Streaming response bodies to disk
//!
//! A file is never written in place. The body is streamed into a sibling
//! temp file which is renamed over the destination once the last chunk is
//! on disk. A failed or cancelled transfer removes the temp file, so a
//! destination either holds complete content or is left as it was.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use osync_core::domain::PARTIAL_SUFFIX;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Why a transfer did not complete
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The connection failed while the body was being read
    #[error("transfer failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Writing or renaming the local file failed
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The session was cancelled mid-transfer
    #[error("cancelled")]
    Cancelled,
}

/// Temp path used while `dest` is being written
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Streams `response` into `temp`, returning the number of bytes written.
///
/// The temp file is closed before this returns. On error it may be left
/// behind; callers decide whether to remove it.
pub async fn stream_to_path(
    response: reqwest::Response,
    temp: &Path,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(temp).await?;
    let mut body = response.bytes_stream();
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = body.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            Some(Err(e)) => return Err(DownloadError::Transport(e)),
            None => break,
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// Downloads `response` to `dest` through a `.osync-part` temp file.
#[instrument(skip_all, fields(dest = %dest.display()))]
pub async fn download_file(
    response: reqwest::Response,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let temp = partial_path(dest);

    let result = match stream_to_path(response, &temp, cancel).await {
        Ok(bytes) => tokio::fs::rename(&temp, dest)
            .await
            .map(|()| bytes)
            .map_err(DownloadError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&temp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(temp = %temp.display(), error = %e, "Could not remove partial file");
            }
        }
    }

    result
}
