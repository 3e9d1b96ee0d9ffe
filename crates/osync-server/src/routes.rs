//! Request routing
//!
//! Every handler answers with a streamed or in-memory body; file contents are
//! never buffered whole. Requests that resolve outside the library (or to
//! nothing) are answered with `404` regardless of the reason, so a client
//! cannot probe for paths outside the root.

use std::convert::Infallible;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use osync_core::domain::{
    address::confine_to, Identifier, LibraryMode, Manifest, PathAddressed, AddressScheme,
    ContentAddressed, DATABASE_FILE,
};
use percent_encoding::percent_decode_str;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

/// Body type of every response.
pub type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Library served by one server instance.
#[derive(Debug, Clone)]
pub struct ServerState {
    root: PathBuf,
    mode: LibraryMode,
}

impl ServerState {
    pub fn new(root: PathBuf, mode: LibraryMode) -> Self {
        Self { root, mode }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> LibraryMode {
        self.mode
    }
}

/// Route a single request.
///
/// The request body is never read, so any body type is accepted.
pub async fn handle<B>(req: Request<B>, state: &ServerState) -> Result<Response<ResponseBody>, Infallible> {
    let path = req.uri().path();

    if req.method() != Method::GET {
        return Ok(text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
    }

    let response = match (path, state.mode) {
        ("/ping", mode) => text(StatusCode::OK, mode.as_wire()),
        ("/manifest", _) => manifest(state).await,
        ("/realm", LibraryMode::Lazer) => realm(state).await,
        ("/file" | "/file/", LibraryMode::Lazer) => text(StatusCode::BAD_REQUEST, "Missing hash"),
        (p, LibraryMode::Lazer) if p.starts_with("/file/") => {
            content_file(state, &p["/file/".len()..]).await
        }
        ("/stable-file", LibraryMode::Stable) => stable_file(state, req.uri().query()).await,
        _ => not_found(),
    };

    debug!(
        method = %req.method(),
        path,
        status = response.status().as_u16(),
        "Handled request"
    );
    Ok(response)
}

// ============================================================================
// Handlers
// ============================================================================

async fn manifest(state: &ServerState) -> Response<ResponseBody> {
    let root = state.root.clone();
    let mode = state.mode;

    match tokio::task::spawn_blocking(move || Manifest::scan(&root, mode)).await {
        Ok(manifest) => {
            debug!(entries = manifest.len(), "Serving manifest");
            text(StatusCode::OK, manifest.to_wire())
        }
        Err(e) => {
            error!(error = %e, "Manifest scan task failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Manifest unavailable")
        }
    }
}

async fn realm(state: &ServerState) -> Response<ResponseBody> {
    match open_file(&state.root.join(DATABASE_FILE)).await {
        Some(response) => response,
        None => text(StatusCode::NOT_FOUND, "DB not found"),
    }
}

async fn content_file(state: &ServerState, raw_hash: &str) -> Response<ResponseBody> {
    let decoded = percent_decode_str(raw_hash).decode_utf8_lossy();
    if decoded.is_empty() {
        return text(StatusCode::BAD_REQUEST, "Missing hash");
    }
    let Ok(id) = Identifier::new(decoded.into_owned()) else {
        return not_found();
    };

    match ContentAddressed.locate(&state.root, &id) {
        Ok(path) => open_file(&path).await.unwrap_or_else(not_found),
        Err(e) => {
            warn!(error = %e, "Rejected content request");
            not_found()
        }
    }
}

async fn stable_file(state: &ServerState, query: Option<&str>) -> Response<ResponseBody> {
    let requested = query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "path")
            .map(|(_, value)| value.into_owned())
    });
    let Some(requested) = requested.filter(|p| !p.is_empty()) else {
        return text(StatusCode::BAD_REQUEST, "Missing path");
    };
    let Ok(id) = Identifier::new(requested) else {
        return not_found();
    };

    let candidate = match PathAddressed.locate(&state.root, &id) {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "Rejected path request");
            return not_found();
        }
    };

    // Symlinks inside Songs may still lead out of it.
    let songs = PathAddressed.content_dir(&state.root);
    let confined = tokio::task::spawn_blocking(move || confine_to(&songs, &candidate))
        .await
        .ok()
        .flatten();

    match confined {
        Some(path) => open_file(&path).await.unwrap_or_else(not_found),
        None => {
            debug!(id = %id, "Path not found inside Songs");
            not_found()
        }
    }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Stream a regular file, or `None` if it does not exist or cannot be read.
async fn open_file(path: &Path) -> Option<Response<ResponseBody>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open file");
            return None;
        }
    };
    let metadata = file.metadata().await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    let stream = ReaderStream::new(file).map_ok(Frame::data);
    let body = StreamBody::new(stream).boxed_unsync();

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, OCTET_STREAM)
        .header(CONTENT_LENGTH, metadata.len())
        .body(body)
        .ok()
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    let mut response = Response::new(
        Full::new(body.into())
            .map_err(|never| match never {})
            .boxed_unsync(),
    );
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static(TEXT_PLAIN));
    response
}

fn not_found() -> Response<ResponseBody> {
    text(StatusCode::NOT_FOUND, "Not Found")
}
