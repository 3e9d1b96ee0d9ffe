//! Server address normalization
//!
//! Users type either a bare host (`192.168.1.20`, `desktop.local`,
//! `desktop:9000`) or a full URL (`http://desktop:8085/`). Bare hosts get
//! the `http` scheme and, unless they name a port, the default port. Full
//! URLs are used verbatim apart from trailing slashes.

use url::Url;

use crate::SyncError;

/// Base URL (no trailing slash) for the server named by `input`.
pub fn normalize_endpoint(input: &str, default_port: u16) -> Result<String, SyncError> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SyncError::InvalidEndpoint(input.to_string()));
    }

    if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|_| SyncError::InvalidEndpoint(input.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(SyncError::InvalidEndpoint(input.to_string()));
        }
        return Ok(trimmed.to_string());
    }

    let url = Url::parse(&format!("http://{trimmed}"))
        .map_err(|_| SyncError::InvalidEndpoint(input.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| SyncError::InvalidEndpoint(input.to_string()))?;
    if url.path() != "/" || url.query().is_some() {
        return Err(SyncError::InvalidEndpoint(input.to_string()));
    }
    let port = url.port().unwrap_or(default_port);

    Ok(format!("http://{host}:{port}"))
}
